//! WebSocket connection loop.
//!
//! The write half of the socket is registered with the [`Hub`]; every
//! outbound frame, broadcast events and direct replies alike, goes through
//! the hub so that writes to one connection stay serialized. The read half
//! is processed here, one frame at a time.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};

use super::actions::process;
use super::messages::{BAD_REQUEST, RequestMessage, ResponseMessage, should_reply_directly};
use crate::client::UserClient;
use crate::hub::{ConnectionHandle, FrameSink, Hub, HubError};

/// Write half of an axum WebSocket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    /// Wraps the write half of a split socket.
    #[must_use]
    pub const fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for WsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsSink").finish_non_exhaustive()
    }
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, payload: Bytes) -> Result<(), HubError> {
        let message = match std::str::from_utf8(&payload) {
            Ok(text) => Message::text(text),
            Err(_) => Message::Binary(payload),
        };
        self.inner
            .send(message)
            .await
            .map_err(|e| HubError::Write(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

/// Serves one WebSocket until the client leaves or a write fails.
pub async fn run_connection(socket: WebSocket, hub: Arc<Hub>, users: UserClient) {
    let (sink, mut stream) = socket.split();
    let handle = hub.register(WsSink::new(sink)).await;
    tracing::info!(connection_id = %handle.id(), "ws client connected");

    while let Some(frame) = stream.next().await {
        let raw = match frame {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!(connection_id = %handle.id(), error = %err, "ws read failed");
                break;
            }
        };

        let Ok(request) = serde_json::from_slice::<RequestMessage>(&raw) else {
            let reply = ResponseMessage::fail("", BAD_REQUEST, "invalid message");
            if reply_to(&hub, &handle, &reply).await.is_err() {
                break;
            }
            continue;
        };

        let (action, response) = process(&users, request).await;
        if should_reply_directly(action, &response)
            && reply_to(&hub, &handle, &response).await.is_err()
        {
            break;
        }
    }

    hub.unregister(&handle).await;
    tracing::info!(connection_id = %handle.id(), "ws client disconnected");
}

async fn reply_to(
    hub: &Hub,
    handle: &ConnectionHandle,
    response: &ResponseMessage,
) -> Result<(), HubError> {
    match serde_json::to_vec(response) {
        Ok(payload) => hub.send_to(handle, Bytes::from(payload)).await,
        Err(err) => {
            tracing::error!(connection_id = %handle.id(), error = %err, "failed to encode reply");
            Ok(())
        }
    }
}
