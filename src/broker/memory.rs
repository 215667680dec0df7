//! In-process broker backed by tokio channels.
//!
//! Each subscription owns a bounded queue. A subscriber whose queue is full
//! misses the message (logged at `warn`), the same way a slow consumer is
//! cut off by a network broker. Subscriptions that were dropped are pruned
//! on the next delivery to their channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};

use super::{Broker, BrokerError, Message, ReplySlot, Subscription};

/// Default per-subscription queue depth.
pub const DEFAULT_CAPACITY: usize = 1024;

/// In-process [`Broker`].
#[derive(Debug)]
pub struct MemoryBroker {
    subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<Message>>>>,
    capacity: usize,
    closed: AtomicBool,
}

impl MemoryBroker {
    /// Creates a broker whose subscriptions each buffer up to `capacity`
    /// messages. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the number of live subscriptions on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(channel)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }

    /// Delivers `message` to every subscriber of its channel and returns how
    /// many accepted it.
    async fn deliver(&self, message: &Message) -> usize {
        let mut map = self.subscribers.write().await;
        let Some(subs) = map.get_mut(&message.channel) else {
            return 0;
        };

        subs.retain(|tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in subs.iter() {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(channel = %message.channel, "slow subscriber, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        if subs.is_empty() {
            map.remove(&message.channel);
        }
        delivered
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let delivered = self.deliver(&Message::new(channel, payload, None)).await;
        tracing::trace!(channel, delivered, "published");
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        tracing::debug!(channel, "subscribed");
        Ok(Subscription::new(channel, rx))
    }

    async fn request(
        &self,
        channel: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BrokerError> {
        self.ensure_open()?;
        let (slot, reply_rx) = ReplySlot::pair();
        let delivered = self
            .deliver(&Message::new(channel, payload, Some(slot)))
            .await;
        if delivered == 0 {
            return Err(BrokerError::NoResponders(channel.to_string()));
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BrokerError::NoReply(channel.to_string())),
            Err(_) => Err(BrokerError::Timeout {
                channel: channel.to_string(),
                timeout,
            }),
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Dropping the senders lets every subscription drain and then end.
        self.subscribers.write().await.clear();
        tracing::info!("broker closed");
    }
}
