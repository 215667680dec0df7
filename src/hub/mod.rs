//! Registry of live client connections with best-effort fan-out.
//!
//! [`Hub`] stores every registered connection in a `RwLock<HashMap>`; each
//! entry carries its own [`tokio::sync::Mutex`] write lock so that writes
//! to one connection are strictly serialized while a broadcast writes to
//! different connections concurrently.
//!
//! # Connection lifecycle
//!
//! `Unregistered → Registered → Closed`. [`Hub::unregister`] removes the
//! entry, then closes it under its write lock: once it returns, no further
//! frame reaches that connection. A write that fails during a broadcast or
//! a targeted send prunes and closes the connection in the same pass.
//!
//! Every write and close runs under the hub's write deadline. A peer that
//! stops reading fails its write once the deadline passes and is pruned
//! like any other broken connection.

pub mod ingest;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::future::join_all;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

pub use ingest::{EventForwarder, forward_events};

/// Write deadline used by [`Hub::new`].
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by connection writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The connection was unregistered or pruned.
    #[error("connection is closed")]
    Closed,

    /// The underlying transport rejected the frame.
    #[error("write failed: {0}")]
    Write(String),
}

/// Write half of a client transport.
#[async_trait]
pub trait FrameSink: Send + fmt::Debug {
    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Write`] if the transport is broken.
    async fn send_frame(&mut self, payload: Bytes) -> Result<(), HubError>;

    /// Closes the transport. Failures are ignored.
    async fn close(&mut self);
}

/// Opaque identifier of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct SlotState {
    sink: Box<dyn FrameSink>,
    closed: bool,
}

/// One connection's sink behind its write lock.
#[derive(Debug)]
struct ConnectionSlot {
    state: Mutex<SlotState>,
    write_timeout: Duration,
}

impl ConnectionSlot {
    async fn write(&self, payload: Bytes) -> Result<(), HubError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(HubError::Closed);
        }
        match tokio::time::timeout(self.write_timeout, state.sink.send_frame(payload)).await {
            Ok(result) => result,
            Err(_) => Err(HubError::Write(format!(
                "write timed out after {:?}",
                self.write_timeout
            ))),
        }
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        if !state.closed {
            state.closed = true;
            if tokio::time::timeout(self.write_timeout, state.sink.close())
                .await
                .is_err()
            {
                tracing::debug!("sink close timed out");
            }
        }
    }
}

/// Handle to a registered connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    slot: Arc<ConnectionSlot>,
}

impl ConnectionHandle {
    /// Identifier of the connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Registry of live connections.
#[derive(Debug)]
pub struct Hub {
    connections: RwLock<HashMap<ConnectionId, Arc<ConnectionSlot>>>,
    write_timeout: Duration,
}

impl Default for Hub {
    fn default() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }
}

impl Hub {
    /// Creates an empty hub with [`DEFAULT_WRITE_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty hub whose writes fail after `write_timeout`. A zero
    /// duration is replaced by [`DEFAULT_WRITE_TIMEOUT`].
    #[must_use]
    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        let write_timeout = if write_timeout.is_zero() {
            DEFAULT_WRITE_TIMEOUT
        } else {
            write_timeout
        };
        Self {
            connections: RwLock::new(HashMap::new()),
            write_timeout,
        }
    }

    /// Deadline applied to every connection write.
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Registers `sink` and returns its handle.
    pub async fn register(&self, sink: impl FrameSink + 'static) -> ConnectionHandle {
        let id = ConnectionId(Uuid::new_v4());
        let slot = Arc::new(ConnectionSlot {
            state: Mutex::new(SlotState {
                sink: Box::new(sink),
                closed: false,
            }),
            write_timeout: self.write_timeout,
        });
        self.connections.write().await.insert(id, Arc::clone(&slot));
        tracing::debug!(connection_id = %id, "connection registered");
        ConnectionHandle { id, slot }
    }

    /// Removes and closes a connection. Returns `true` if it was still
    /// registered; calling it again is a no-op.
    pub async fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let removed = self.connections.write().await.remove(&handle.id).is_some();
        handle.slot.close().await;
        if removed {
            tracing::debug!(connection_id = %handle.id, "connection unregistered");
        }
        removed
    }

    /// Writes `payload` to every registered connection and returns how many
    /// accepted it. Connections whose write fails are pruned.
    pub async fn broadcast(&self, payload: Bytes) -> usize {
        self.fan_out(payload, None).await
    }

    /// Like [`Hub::broadcast`] but skips `except`.
    pub async fn broadcast_except(&self, payload: Bytes, except: &ConnectionHandle) -> usize {
        self.fan_out(payload, Some(except.id)).await
    }

    /// Writes `payload` to one connection.
    ///
    /// # Errors
    ///
    /// [`HubError::Closed`] if the connection is no longer registered,
    /// [`HubError::Write`] if the write failed (the connection is pruned).
    pub async fn send_to(&self, handle: &ConnectionHandle, payload: Bytes) -> Result<(), HubError> {
        let result = handle.slot.write(payload).await;
        if let Err(HubError::Write(reason)) = &result {
            self.prune(handle.id, &handle.slot, reason).await;
        }
        result
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Returns `true` if `handle` is still registered.
    pub async fn contains(&self, handle: &ConnectionHandle) -> bool {
        self.connections.read().await.contains_key(&handle.id)
    }

    /// Unregisters and closes every connection.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.connections.write().await.drain().collect();
        let count = drained.len();
        join_all(drained.iter().map(|(_, slot)| slot.close())).await;
        tracing::info!(count, "closed all connections");
    }

    async fn fan_out(&self, payload: Bytes, except: Option<ConnectionId>) -> usize {
        let snapshot: Vec<(ConnectionId, Arc<ConnectionSlot>)> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let writes = snapshot.iter().map(|(id, slot)| {
            let payload = payload.clone();
            async move { (*id, slot, slot.write(payload).await) }
        });

        let mut delivered = 0;
        for (id, slot, result) in join_all(writes).await {
            match result {
                Ok(()) => delivered += 1,
                Err(HubError::Closed) => {}
                Err(HubError::Write(reason)) => self.prune(id, slot, &reason).await,
            }
        }
        delivered
    }

    async fn prune(&self, id: ConnectionId, slot: &ConnectionSlot, reason: &str) {
        self.connections.write().await.remove(&id);
        slot.close().await;
        tracing::warn!(connection_id = %id, reason, "pruned connection after failed write");
    }
}
