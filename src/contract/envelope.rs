//! Request, response and event envelopes.
//!
//! The envelopes are generic over their payload so that each command can
//! carry its own typed input and output. Field names are fixed by the wire
//! contract: `requestId`, `data`, `ok`, `error`, `code`, `message`,
//! `eventId`, `type`, `occurredAt`.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A command sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest<T> {
    /// Caller-generated id, informational only (used for tracing).
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// Command-specific payload.
    pub data: T,
}

impl<T> CommandRequest<T> {
    /// Wraps `data` with a fresh random request id.
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            data,
        }
    }
}

/// Machine-readable error discriminant.
///
/// Codes other than the three known ones are preserved verbatim in
/// [`ErrorCode::Other`] so that a newer server does not break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// Malformed or invalid input, or a uniqueness conflict.
    BadRequest,
    /// The addressed record does not exist.
    NotFound,
    /// Any other failure. The message is deliberately generic.
    Internal,
    /// A code this build does not know about.
    Other(String),
}

impl ErrorCode {
    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "BAD_REQUEST" => Self::BadRequest,
            "NOT_FOUND" => Self::NotFound,
            "INTERNAL" => Self::Internal,
            _ => Self::Other(code),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carried by a failed [`CommandResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
    /// Discriminant callers branch on.
    pub code: ErrorCode,
    /// Human-readable text; never parsed by callers.
    pub message: String,
}

/// Reply to a [`CommandRequest`].
///
/// On success `data` may be present; on failure `data` is absent and
/// `error` describes the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse<T> {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl<T> CommandResponse<T> {
    /// A successful response carrying `data`.
    #[must_use]
    pub const fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(CommandError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Domain event published after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event<T> {
    /// Server-generated unique id.
    #[serde(rename = "eventId")]
    pub event_id: String,
    /// Event type, e.g. `user.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// UTC occurrence time, whole seconds (`2024-01-02T03:04:05Z`).
    #[serde(rename = "occurredAt", with = "occurred_at")]
    pub occurred_at: DateTime<Utc>,
    /// Event payload.
    pub data: T,
}

impl<T> Event<T> {
    /// Builds an event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: T) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            occurred_at: Utc::now().trunc_subsecs(0),
            data,
        }
    }
}

/// Fixed `YYYY-MM-DDTHH:MM:SSZ` format for `occurredAt`.
mod occurred_at {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
