use crate::error::RelayError;
use crate::signaling::relay::{Relay, RelaySubscription};
use async_trait::async_trait;
use dashmap::DashMap;
use feedlink_core::{FeedKey, RelayDocument, RelayPatch, SubscriptionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Default)]
struct FeedEntry {
    document: Option<RelayDocument>,
    last_timestamp: u64,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<RelayDocument>>,
}

struct RelayHubInner {
    feeds: DashMap<FeedKey, FeedEntry>,
}

/// In-process [`Relay`]: one merged document per feed, fanned out to every subscriber.
///
/// Cheap to clone; clones share the same documents. Also backs the WebSocket relay endpoint.
#[derive(Clone)]
pub struct RelayHub {
    inner: Arc<RelayHubInner>,
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RelayHubInner {
                feeds: DashMap::new(),
            }),
        }
    }

    /// Current document of a feed, if anything was written to it.
    pub fn snapshot(&self, feed_key: &FeedKey) -> Option<RelayDocument> {
        self.inner
            .feeds
            .get(feed_key)
            .and_then(|entry| entry.document.clone())
    }

    pub fn subscriber_count(&self, feed_key: &FeedKey) -> usize {
        self.inner
            .feeds
            .get(feed_key)
            .map(|entry| entry.subscribers.len())
            .unwrap_or(0)
    }

    /// Drops a feed's document and subscriptions.
    pub fn remove_feed(&self, feed_key: &FeedKey) {
        if self.inner.feeds.remove(feed_key).is_some() {
            info!(feed = %feed_key, "Relay document removed");
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl Relay for RelayHub {
    async fn merge(&self, feed_key: &FeedKey, mut patch: RelayPatch) -> Result<u64, RelayError> {
        if !feed_key.is_valid() {
            return Err(RelayError::Rejected(format!("invalid feed key '{feed_key}'")));
        }
        // The address decides which feed a write belongs to, not the payload.
        patch.space_id = Some(feed_key.space_id.clone());
        patch.feed_id = Some(feed_key.feed_id.clone());

        let mut entry = self.inner.feeds.entry(feed_key.clone()).or_default();
        let timestamp = Self::now_ms().max(entry.last_timestamp + 1);
        entry.last_timestamp = timestamp;

        let document = entry.document.get_or_insert_with(RelayDocument::default);
        document.merge(patch, timestamp);
        let snapshot = document.clone();

        entry
            .subscribers
            .retain(|_, tx| tx.send(snapshot.clone()).is_ok());

        debug!(
            feed = %feed_key,
            kind = ?snapshot.kind,
            timestamp,
            subscribers = entry.subscribers.len(),
            "Relay document merged"
        );
        Ok(timestamp)
    }

    async fn subscribe(&self, feed_key: &FeedKey) -> Result<RelaySubscription, RelayError> {
        if !feed_key.is_valid() {
            return Err(RelayError::Rejected(format!("invalid feed key '{feed_key}'")));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        let mut entry = self.inner.feeds.entry(feed_key.clone()).or_default();
        if let Some(document) = &entry.document {
            // Receiver is alive, it is still in our hands.
            let _ = tx.send(document.clone());
        }
        entry.subscribers.insert(id, tx);

        debug!(feed = %feed_key, subscription = %id, "Relay subscription added");
        Ok(RelaySubscription { id, snapshots: rx })
    }

    async fn unsubscribe(&self, feed_key: &FeedKey, id: SubscriptionId) {
        if let Some(mut entry) = self.inner.feeds.get_mut(feed_key)
            && entry.subscribers.remove(&id).is_some()
        {
            debug!(feed = %feed_key, subscription = %id, "Relay subscription removed");
        }
    }
}
