//! Broker channel names. These strings are the interop contract with every
//! other producer and consumer on the bus and must not change.

/// Channel for the `create` command.
pub const USER_COMMAND_CREATE: &str = "user.command.create";
/// Channel for the `list` command.
pub const USER_COMMAND_LIST: &str = "user.command.list";
/// Channel for the `get` command.
pub const USER_COMMAND_GET: &str = "user.command.get";
/// Channel for the `update` command.
pub const USER_COMMAND_UPDATE: &str = "user.command.update";
/// Channel for the `delete` command.
pub const USER_COMMAND_DELETE: &str = "user.command.delete";

/// Channel carrying `user.created` events.
pub const USER_EVENT_CREATED: &str = "user.event.created";
/// Channel carrying `user.updated` events.
pub const USER_EVENT_UPDATED: &str = "user.event.updated";
/// Channel carrying `user.deleted` events.
pub const USER_EVENT_DELETED: &str = "user.event.deleted";

/// Every event channel, in the order the hub subscribes to them.
pub const USER_EVENT_CHANNELS: [&str; 3] =
    [USER_EVENT_CREATED, USER_EVENT_UPDATED, USER_EVENT_DELETED];

/// The command set served by the user service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Create a user.
    Create,
    /// List all users.
    List,
    /// Fetch one user by id.
    Get,
    /// Partially update a user.
    Update,
    /// Delete a user.
    Delete,
}

impl Command {
    /// Every command, one subscription each.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::List,
        Self::Get,
        Self::Update,
        Self::Delete,
    ];

    /// Channel this command is served on.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Create => USER_COMMAND_CREATE,
            Self::List => USER_COMMAND_LIST,
            Self::Get => USER_COMMAND_GET,
            Self::Update => USER_COMMAND_UPDATE,
            Self::Delete => USER_COMMAND_DELETE,
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Domain events published after a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A user was created.
    Created,
    /// A user was updated.
    Updated,
    /// A user was deleted.
    Deleted,
}

impl EventKind {
    /// Channel the event is published on.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Created => USER_EVENT_CREATED,
            Self::Updated => USER_EVENT_UPDATED,
            Self::Deleted => USER_EVENT_DELETED,
        }
    }

    /// Value of the envelope `type` field.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Created => "user.created",
            Self::Updated => "user.updated",
            Self::Deleted => "user.deleted",
        }
    }
}
