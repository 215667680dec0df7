//! WebSocket message types: inbound requests and direct replies.
//!
//! Broadcast events are not defined here; they are the broker event
//! envelopes forwarded byte for byte.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::client::ClientError;
use crate::domain::UpdateUserInput;

/// Inbound frame sent by a WebSocket client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMessage {
    /// Client-chosen id echoed in the direct reply.
    #[serde(default)]
    pub request_id: String,
    /// Action name, e.g. `user.create`.
    pub action: String,
    /// Action-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Direct reply to a [`RequestMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    /// Echo of the request id; omitted for unparsable frames.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// Whether the action succeeded.
    pub ok: bool,
    /// Result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorMessage>,
}

impl ResponseMessage {
    /// A successful reply.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn fail(request_id: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ok: false,
            data: None,
            error: Some(ErrorMessage {
                code: code.to_string(),
                message: message.into(),
            }),
        }
    }

    /// Maps a client failure. Internal details are not exposed.
    #[must_use]
    pub fn from_client_error(request_id: impl Into<String>, err: &ClientError) -> Self {
        match err {
            ClientError::BadRequest(message) => {
                Self::fail(request_id, BAD_REQUEST, message.as_str())
            }
            ClientError::NotFound(message) => Self::fail(request_id, NOT_FOUND, message.as_str()),
            _ => Self::fail(request_id, INTERNAL_ERROR, "internal server error"),
        }
    }
}

/// Error object of a failed [`ResponseMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// `bad_request`, `not_found` or `internal_error`.
    pub code: String,
    /// Human-readable text.
    pub message: String,
}

/// Error code for rejected input.
pub const BAD_REQUEST: &str = "bad_request";
/// Error code for a missing user.
pub const NOT_FOUND: &str = "not_found";
/// Error code for every other failure.
pub const INTERNAL_ERROR: &str = "internal_error";

/// Payload of `user.get` and `user.delete`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdPayload {
    /// Target user id.
    pub id: String,
}

/// Payload of `user.update`: the id next to the changed fields.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePayload {
    /// Target user id.
    pub id: String,
    /// Fields to change.
    #[serde(flatten)]
    pub changes: UpdateUserInput,
}

/// Actions accepted over WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `user.create`
    Create,
    /// `user.list`
    List,
    /// `user.get`
    Get,
    /// `user.update`
    Update,
    /// `user.delete`
    Delete,
}

impl Action {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "user.create",
            Self::List => "user.list",
            Self::Get => "user.get",
            Self::Update => "user.update",
            Self::Delete => "user.delete",
        }
    }

    /// Returns `true` for actions whose success is reported only through
    /// the broadcast event.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an action name outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user.create" => Ok(Self::Create),
            "user.list" => Ok(Self::List),
            "user.get" => Ok(Self::Get),
            "user.update" => Ok(Self::Update),
            "user.delete" => Ok(Self::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Whether `response` is written back to the requesting connection.
///
/// Failures always are. Successful mutations are not: the caller learns of
/// them from the event broadcast to every connection.
#[must_use]
pub fn should_reply_directly(action: Option<Action>, response: &ResponseMessage) -> bool {
    !response.ok || !action.is_some_and(|a| a.is_mutation())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse() {
        for action in [
            Action::Create,
            Action::List,
            Action::Get,
            Action::Update,
            Action::Delete,
        ] {
            assert_eq!(action.as_str().parse(), Ok(action));
        }
        assert_eq!(
            "user.explode".parse::<Action>(),
            Err(UnknownAction("user.explode".to_string()))
        );
    }

    #[test]
    fn mutations_reply_only_on_failure() {
        let ok = ResponseMessage::ok("r", serde_json::Value::Null);
        let failed = ResponseMessage::fail("r", BAD_REQUEST, "nope");

        assert!(!should_reply_directly(Some(Action::Create), &ok));
        assert!(should_reply_directly(Some(Action::Create), &failed));
        assert!(should_reply_directly(Some(Action::List), &ok));
        assert!(should_reply_directly(None, &failed));
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = ClientError::Service {
            code: crate::contract::ErrorCode::Internal,
            message: "failed to get user".to_string(),
        };
        let reply = ResponseMessage::from_client_error("r", &err);
        let Some(error) = reply.error else {
            panic!("expected an error");
        };
        assert_eq!(error.code, INTERNAL_ERROR);
        assert_eq!(error.message, "internal server error");
    }

    #[test]
    fn empty_request_id_is_omitted() {
        let reply = ResponseMessage::fail("", BAD_REQUEST, "invalid message");
        let Ok(json) = serde_json::to_value(&reply) else {
            panic!("serialization failed");
        };
        assert_eq!(
            json,
            serde_json::json!({
                "ok": false,
                "error": {"code": "bad_request", "message": "invalid message"}
            })
        );
    }
}
