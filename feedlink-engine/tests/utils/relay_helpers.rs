use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use feedlink_core::{
    ConnectionState, FeedKey, IceCandidatePayload, NegotiationRole, RelayDocument, RelayPatch,
    SessionDescription, SignalPayload, SubscriptionId,
};
use feedlink_engine::{
    FeedSessionHandle, LocalTrack, Relay, RelayError, RelayHub, RelaySubscription,
};
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Timeout for relay round trips (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// Timeout for a real peer connection to come up (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 15000;

pub fn test_feed() -> FeedKey {
    FeedKey::new("space-test", "feed-test")
}

/// Writes `payload` to the relay as if the remote side of `role` had sent it.
pub async fn write_as(
    hub: &RelayHub,
    feed_key: &FeedKey,
    role: NegotiationRole,
    payload: SignalPayload,
) -> Result<u64> {
    let ts = hub
        .merge(feed_key, RelayPatch::for_payload(feed_key, role, payload))
        .await
        .context("relay write failed")?;
    Ok(ts)
}

pub fn answer(sdp: &str) -> SignalPayload {
    SignalPayload::Answer(SessionDescription::answer(sdp))
}

pub fn offer(sdp: &str) -> SignalPayload {
    SignalPayload::Offer(SessionDescription::offer(sdp))
}

pub fn candidate(line: &str) -> SignalPayload {
    SignalPayload::IceCandidate(IceCandidatePayload::new(line))
}

/// Wait for a relay snapshot matching `predicate`.
pub async fn wait_for_document<F>(
    snapshots: &mut mpsc::UnboundedReceiver<RelayDocument>,
    predicate: F,
    timeout_ms: u64,
) -> Result<RelayDocument>
where
    F: Fn(&RelayDocument) -> bool,
{
    let wait = async {
        while let Some(doc) = snapshots.recv().await {
            if predicate(&doc) {
                return Some(doc);
            }
        }
        None
    };
    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(Some(doc)) => Ok(doc),
        Ok(None) => bail!("relay subscription closed"),
        Err(_) => bail!("timed out waiting for relay document"),
    }
}

/// Wait until the session reports `expected`.
pub async fn wait_for_state(
    handle: &FeedSessionHandle,
    expected: ConnectionState,
    timeout_ms: u64,
) -> Result<()> {
    let mut states = handle.observe_state();
    let wait = async {
        while let Some(state) = states.next().await {
            if state == expected {
                return true;
            }
        }
        false
    };
    match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
        Ok(true) => Ok(()),
        Ok(false) => bail!(
            "state stream ended before {expected}, last {}",
            handle.current_state()
        ),
        Err(_) => bail!(
            "timed out waiting for {expected}, current {}",
            handle.current_state()
        ),
    }
}

/// A VP8 track suitable for attaching as local media.
pub fn video_track(id: &str) -> LocalTrack {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        id.to_owned(),
        "feedlink-test".to_owned(),
    ))
}

/// Relay wrapper that can be switched offline, failing writes with `Unavailable`.
#[derive(Clone)]
pub struct SwitchableRelay {
    hub: RelayHub,
    offline: Arc<AtomicBool>,
}

impl SwitchableRelay {
    pub fn new(hub: RelayHub) -> Self {
        Self {
            hub,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Relay for SwitchableRelay {
    async fn merge(&self, feed_key: &FeedKey, patch: RelayPatch) -> Result<u64, RelayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RelayError::Unavailable("relay switched off".into()));
        }
        self.hub.merge(feed_key, patch).await
    }

    async fn subscribe(&self, feed_key: &FeedKey) -> Result<RelaySubscription, RelayError> {
        self.hub.subscribe(feed_key).await
    }

    async fn unsubscribe(&self, feed_key: &FeedKey, id: SubscriptionId) {
        self.hub.unsubscribe(feed_key, id).await
    }
}
