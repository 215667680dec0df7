//! Forwards domain events from the broker to every hub connection.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::Hub;
use crate::broker::{Broker, BrokerError, Subscription};
use crate::contract::USER_EVENT_CHANNELS;

/// One forwarding task per event channel.
#[derive(Debug)]
pub struct EventForwarder {
    tasks: Vec<JoinHandle<()>>,
}

impl EventForwarder {
    /// Stops forwarding.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Subscribes to the user event channels and broadcasts each payload
/// unmodified.
///
/// # Errors
///
/// Returns a [`BrokerError`] if a subscription fails; tasks already
/// started are stopped.
pub async fn forward_events(
    broker: &dyn Broker,
    hub: Arc<Hub>,
) -> Result<EventForwarder, BrokerError> {
    let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(USER_EVENT_CHANNELS.len());
    for channel in USER_EVENT_CHANNELS {
        match broker.subscribe(channel).await {
            Ok(sub) => tasks.push(tokio::spawn(forward(sub, Arc::clone(&hub)))),
            Err(err) => {
                EventForwarder { tasks }.shutdown();
                return Err(err);
            }
        }
    }
    Ok(EventForwarder { tasks })
}

async fn forward(mut subscription: Subscription, hub: Arc<Hub>) {
    while let Some(message) = subscription.next().await {
        let delivered = hub.broadcast(message.payload).await;
        tracing::debug!(channel = %message.channel, delivered, "event forwarded");
    }
    tracing::debug!(channel = subscription.channel(), "event subscription ended");
}
