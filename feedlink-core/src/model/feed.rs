use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one logical video feed: the space it belongs to plus the feed itself.
///
/// Rendered as `{space_id}:{feed_id}`, which is also the relay document address.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedKey {
    pub space_id: String,
    pub feed_id: String,
}

impl FeedKey {
    pub fn new(space_id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            space_id: space_id.into(),
            feed_id: feed_id.into(),
        }
    }

    /// Both halves must be non-empty for the key to address a relay document.
    pub fn is_valid(&self) -> bool {
        !self.space_id.is_empty() && !self.feed_id.is_empty()
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space_id, self.feed_id)
    }
}
