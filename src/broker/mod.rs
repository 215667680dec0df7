//! Publish/subscribe broker abstraction.
//!
//! The [`Broker`] trait is the only way the command client, the command
//! server and the hub talk to each other. It offers fire-and-forget
//! publish, channel subscriptions and request-reply with a timeout. Reply
//! addressing is carried by the delivered [`Message`] itself: a handler
//! answers "whoever sent this request" through [`Message::respond`].
//!
//! The broker is a single injected dependency with an explicit lifecycle:
//! it is opened at startup, shared as `Arc<dyn Broker>`, and closed at
//! shutdown via [`Broker::close`].

pub mod memory;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

pub use memory::MemoryBroker;

/// Broker-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// The broker has been closed.
    #[error("broker is closed")]
    Closed,

    /// A request was sent to a channel nobody subscribes to.
    #[error("no responders on channel {0}")]
    NoResponders(String),

    /// No reply arrived within the allotted time.
    #[error("request on channel {channel} timed out after {timeout:?}")]
    Timeout {
        /// Channel the request was sent to.
        channel: String,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Every responder dropped the request without answering.
    #[error("request on channel {0} was dropped without a reply")]
    NoReply(String),

    /// The requester is gone (timed out or already answered).
    #[error("reply target is gone")]
    ReplyDropped,

    /// The message was published, not requested, so it cannot be answered.
    #[error("message does not expect a reply")]
    NoReplyExpected,
}

/// Publish/subscribe transport with request-reply semantics.
#[async_trait]
pub trait Broker: Send + Sync + fmt::Debug {
    /// Publishes `payload` to every current subscriber of `channel`.
    ///
    /// Publishing to a channel without subscribers succeeds and the payload
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] after [`Broker::close`].
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BrokerError>;

    /// Subscribes to `channel`. Messages published after this call are
    /// delivered to the returned [`Subscription`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Closed`] after [`Broker::close`].
    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError>;

    /// Sends `payload` to `channel` and waits for exactly one reply.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NoResponders`] if nobody subscribes to `channel`.
    /// - [`BrokerError::Timeout`] if no reply arrives within `timeout`.
    /// - [`BrokerError::NoReply`] if every responder dropped the request.
    /// - [`BrokerError::Closed`] after [`Broker::close`].
    async fn request(
        &self,
        channel: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BrokerError>;

    /// Closes the broker. Subscriptions end once their queued messages are
    /// drained and every further operation fails with [`BrokerError::Closed`].
    async fn close(&self);
}

/// One-shot reply slot shared by every copy of a requested message.
///
/// The first [`Message::respond`] wins; later responses fail with
/// [`BrokerError::ReplyDropped`].
#[derive(Clone)]
pub struct ReplySlot(Arc<Mutex<Option<oneshot::Sender<Bytes>>>>);

impl ReplySlot {
    /// Creates a slot and the receiver the requester waits on.
    #[must_use]
    pub fn pair() -> (Self, oneshot::Receiver<Bytes>) {
        let (tx, rx) = oneshot::channel();
        (Self(Arc::new(Mutex::new(Some(tx)))), rx)
    }

    fn send(&self, payload: Bytes) -> Result<(), BrokerError> {
        let sender = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(BrokerError::ReplyDropped)?;
        sender.send(payload).map_err(|_| BrokerError::ReplyDropped)
    }
}

impl fmt::Debug for ReplySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySlot").finish_non_exhaustive()
    }
}

/// A message delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct Message {
    /// Channel the message was sent to.
    pub channel: String,
    /// Raw payload, forwarded verbatim.
    pub payload: Bytes,
    reply: Option<ReplySlot>,
}

impl Message {
    /// Creates a message. `reply` is `Some` for requests.
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: Bytes, reply: Option<ReplySlot>) -> Self {
        Self {
            channel: channel.into(),
            payload,
            reply,
        }
    }

    /// Returns `true` if the sender is waiting for a reply.
    #[must_use]
    pub const fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Answers the sender of this message.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NoReplyExpected`] for published (not requested)
    ///   messages.
    /// - [`BrokerError::ReplyDropped`] if the requester already gave up or
    ///   another responder answered first.
    pub fn respond(&self, payload: Bytes) -> Result<(), BrokerError> {
        match &self.reply {
            Some(slot) => slot.send(payload),
            None => Err(BrokerError::NoReplyExpected),
        }
    }
}

/// Stream of messages for one channel.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    receiver: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Wraps the receiving half of a subscriber queue.
    #[must_use]
    pub fn new(channel: impl Into<String>, receiver: mpsc::Receiver<Message>) -> Self {
        Self {
            channel: channel.into(),
            receiver,
        }
    }

    /// Channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message. Returns `None` once the broker closed
    /// and the queue is drained.
    pub async fn next(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}
