//! Wire contract shared by the gateway and the user service.
//!
//! Defines the generic request / response / event envelopes, the JSON
//! codec used to turn them into broker payloads, the command payload
//! types, and the fixed channel names.

pub mod codec;
pub mod envelope;
pub mod payloads;
pub mod subjects;

pub use codec::{DecodeError, EncodeError, decode, encode};
pub use envelope::{CommandError, CommandRequest, CommandResponse, ErrorCode, Event};
pub use payloads::{DeleteResult, DeletedUser, IdRequest, ListUsersRequest, UpdateUserRequest};
pub use subjects::{
    Command, EventKind, USER_COMMAND_CREATE, USER_COMMAND_DELETE, USER_COMMAND_GET,
    USER_COMMAND_LIST, USER_COMMAND_UPDATE, USER_EVENT_CHANNELS, USER_EVENT_CREATED,
    USER_EVENT_DELETED, USER_EVENT_UPDATED,
};
