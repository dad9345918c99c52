use crate::config::RelayRetryConfig;
use crate::error::RelayError;
use crate::signaling::relay::{Relay, RelaySubscription};
use feedlink_core::{
    FeedKey, NegotiationRole, RelayPatch, SignalMessage, SignalPayload, SubscriptionId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ActiveSubscription {
    id: SubscriptionId,
    forwarder: JoinHandle<()>,
}

/// Sends and receives one feed's negotiation messages through the relay document.
pub struct SignalingChannel {
    feed_key: FeedKey,
    role: NegotiationRole,
    relay: Arc<dyn Relay>,
    retry: RelayRetryConfig,
    subscription: Option<ActiveSubscription>,
}

impl SignalingChannel {
    pub fn new(
        feed_key: FeedKey,
        role: NegotiationRole,
        relay: Arc<dyn Relay>,
        retry: RelayRetryConfig,
    ) -> Self {
        Self {
            feed_key,
            role,
            relay,
            retry,
            subscription: None,
        }
    }

    pub fn feed_key(&self) -> &FeedKey {
        &self.feed_key
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Merges `payload` into the feed document, tagged with this side's role.
    ///
    /// Returns the relay timestamp of the write. `Unavailable` errors are retried with
    /// exponential backoff up to the configured limit.
    pub async fn send(&self, payload: SignalPayload) -> Result<u64, RelayError> {
        let kind = payload.kind();
        let patch = RelayPatch::for_payload(&self.feed_key, self.role, payload);

        let mut retry = 0;
        loop {
            match self.relay.merge(&self.feed_key, patch.clone()).await {
                Ok(timestamp) => {
                    debug!(feed = %self.feed_key, ?kind, timestamp, "Signal sent");
                    return Ok(timestamp);
                }
                Err(e) if e.is_retryable() && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff(retry);
                    retry += 1;
                    warn!(
                        feed = %self.feed_key,
                        ?kind,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "Relay write failed, retrying: {}", e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(feed = %self.feed_key, ?kind, "Relay write failed: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Starts forwarding decoded messages written by the other side into `messages`.
    ///
    /// Messages arrive one at a time, in relay change order. Snapshots written by this side,
    /// or that decode to nothing, are skipped. Subscribing twice keeps the first subscription.
    pub async fn subscribe(
        &mut self,
        messages: mpsc::Sender<SignalMessage>,
    ) -> Result<(), RelayError> {
        if self.subscription.is_some() {
            debug!(feed = %self.feed_key, "Already subscribed");
            return Ok(());
        }

        let RelaySubscription { id, mut snapshots } = self.relay.subscribe(&self.feed_key).await?;
        let feed_key = self.feed_key.clone();
        let role = self.role;

        let forwarder = tokio::spawn(async move {
            while let Some(document) = snapshots.recv().await {
                if document.role == Some(role) {
                    continue;
                }
                let Some(message) = document.decode() else {
                    debug!(feed = %feed_key, "Incomplete relay snapshot skipped");
                    continue;
                };
                if message.feed_key != feed_key {
                    warn!(feed = %feed_key, other = %message.feed_key, "Snapshot for another feed skipped");
                    continue;
                }
                if messages.send(message).await.is_err() {
                    break;
                }
            }
            debug!(feed = %feed_key, "Relay forwarder finished");
        });

        info!(feed = %self.feed_key, subscription = %id, role = %self.role, "Subscribed to relay");
        self.subscription = Some(ActiveSubscription { id, forwarder });
        Ok(())
    }

    /// Stops delivery. Safe to call repeatedly; nothing is forwarded once it returns.
    pub async fn unsubscribe(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        subscription.forwarder.abort();
        self.relay.unsubscribe(&self.feed_key, subscription.id).await;
        info!(feed = %self.feed_key, subscription = %subscription.id, "Unsubscribed from relay");
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        if let Some(subscription) = &self.subscription {
            subscription.forwarder.abort();
        }
    }
}
