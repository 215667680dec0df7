//! Request-reply client for the user command bus.
//!
//! [`CommandClient`] is generic over request and response payloads; it
//! wraps the payload in a [`CommandRequest`], issues a broker request with
//! a timeout and maps the [`CommandResponse`] onto [`ClientError`].
//! [`UserClient`] binds it to the five user commands.

pub mod users;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::broker::{Broker, BrokerError};
use crate::contract::{
    CommandRequest, CommandResponse, DecodeError, EncodeError, ErrorCode, decode, encode,
};

pub use users::UserClient;

/// Timeout applied when none (or zero) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of a single command call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No reply within the timeout.
    #[error("request on {channel} timed out after {timeout:?}")]
    Timeout {
        /// Command channel.
        channel: String,
        /// Elapsed timeout.
        timeout: Duration,
    },

    /// The broker could not deliver the request (including "no responders").
    #[error("transport failure: {0}")]
    Transport(BrokerError),

    /// The server rejected the input.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Any other server-side failure, with the code as sent.
    #[error("{message}")]
    Service {
        /// Error code carried by the reply.
        code: ErrorCode,
        /// Message carried by the reply.
        message: String,
    },

    /// A successful reply lacked the data this command must return.
    #[error("empty response on {channel}")]
    EmptyResponse {
        /// Command channel.
        channel: String,
    },

    /// The request could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The reply could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<BrokerError> for ClientError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Timeout { channel, timeout } => Self::Timeout { channel, timeout },
            other => Self::Transport(other),
        }
    }
}

/// Generic command caller over a shared [`Broker`].
#[derive(Debug, Clone)]
pub struct CommandClient {
    broker: Arc<dyn Broker>,
    timeout: Duration,
}

impl CommandClient {
    /// Creates a client. A zero `timeout` is replaced by [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new(broker: Arc<dyn Broker>, timeout: Duration) -> Self {
        let timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        Self { broker, timeout }
    }

    /// The timeout applied to every call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `payload` on `channel` and returns the reply data, which must
    /// be present. Waits up to the client's configured timeout.
    ///
    /// # Errors
    ///
    /// See [`ClientError`]; a successful reply without data yields
    /// [`ClientError::EmptyResponse`].
    pub async fn call<Req, Resp>(&self, channel: &str, payload: Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + Send + Sync,
        Resp: DeserializeOwned,
    {
        self.call_with_timeout(channel, payload, self.timeout).await
    }

    /// Like [`CommandClient::call`] with an explicit `timeout` for this call
    /// only. A zero `timeout` uses the client's configured one.
    ///
    /// # Errors
    ///
    /// See [`CommandClient::call`].
    pub async fn call_with_timeout<Req, Resp>(
        &self,
        channel: &str,
        payload: Req,
        timeout: Duration,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize + Send + Sync,
        Resp: DeserializeOwned,
    {
        self.exchange(channel, payload, timeout)
            .await?
            .ok_or_else(|| ClientError::EmptyResponse {
                channel: channel.to_string(),
            })
    }

    /// Like [`CommandClient::call`] but a successful reply may omit data.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn call_optional<Req, Resp>(
        &self,
        channel: &str,
        payload: Req,
    ) -> Result<Option<Resp>, ClientError>
    where
        Req: Serialize + Send + Sync,
        Resp: DeserializeOwned,
    {
        self.exchange(channel, payload, self.timeout).await
    }

    async fn exchange<Req, Resp>(
        &self,
        channel: &str,
        payload: Req,
        timeout: Duration,
    ) -> Result<Option<Resp>, ClientError>
    where
        Req: Serialize + Send + Sync,
        Resp: DeserializeOwned,
    {
        let timeout = if timeout.is_zero() {
            self.timeout
        } else {
            timeout
        };
        let request = CommandRequest::new(payload);
        let body = encode(&request)?;
        tracing::debug!(channel, request_id = %request.request_id, "sending command");

        let reply = self.broker.request(channel, body, timeout).await?;
        let response: CommandResponse<Resp> = decode(&reply)?;

        if response.ok {
            return Ok(response.data);
        }
        Err(match response.error {
            Some(err) => match err.code {
                ErrorCode::BadRequest => ClientError::BadRequest(err.message),
                ErrorCode::NotFound => ClientError::NotFound(err.message),
                code => ClientError::Service {
                    code,
                    message: err.message,
                },
            },
            None => ClientError::Service {
                code: ErrorCode::Internal,
                message: "request failed".to_string(),
            },
        })
    }
}
