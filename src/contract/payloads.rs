//! Command payloads that are not domain entities.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{UpdateUserInput, UserId};

/// Payload of the `list` command. Carries nothing but must be an object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersRequest {}

/// Payload of the `get` and `delete` commands.
///
/// The id travels as a string so that the server can answer a malformed id
/// with a specific message instead of a generic decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRequest {
    /// Hyphenated UUID of the target user.
    pub id: String,
}

impl From<UserId> for IdRequest {
    fn from(id: UserId) -> Self {
        Self { id: id.to_string() }
    }
}

/// Payload of the `update` command: target id plus the partial input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    /// Hyphenated UUID of the target user.
    pub id: String,
    /// Fields to change.
    #[serde(flatten)]
    pub changes: UpdateUserInput,
}

/// Reply data of a successful `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteResult {
    /// Confirmation text, `user deleted`.
    pub message: String,
}

impl DeleteResult {
    /// The confirmation returned for every successful delete.
    #[must_use]
    pub fn deleted() -> Self {
        Self {
            message: "user deleted".to_string(),
        }
    }
}

/// Data of a `user.deleted` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedUser {
    /// Id of the removed user.
    pub user_id: UserId,
}
