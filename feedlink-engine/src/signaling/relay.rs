use crate::error::RelayError;
use async_trait::async_trait;
use feedlink_core::{FeedKey, RelayDocument, RelayPatch, SubscriptionId};
use tokio::sync::mpsc;

/// A standing subscription to one feed's relay document.
pub struct RelaySubscription {
    pub id: SubscriptionId,
    /// Every snapshot of the document after a change, in change order.
    pub snapshots: mpsc::UnboundedReceiver<RelayDocument>,
}

/// The external store holding one mutable document per feed.
///
/// Implementations must merge writes field by field and stamp each with a timestamp strictly
/// greater than the previous one for the same feed.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Merges `patch` into the feed's document and returns the timestamp assigned to the write.
    async fn merge(&self, feed_key: &FeedKey, patch: RelayPatch) -> Result<u64, RelayError>;

    /// Starts receiving snapshots. The current document, if any, is delivered first.
    async fn subscribe(&self, feed_key: &FeedKey) -> Result<RelaySubscription, RelayError>;

    /// Stops a subscription. Unknown ids are ignored.
    async fn unsubscribe(&self, feed_key: &FeedKey, id: SubscriptionId);
}
