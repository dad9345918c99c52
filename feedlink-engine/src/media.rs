use feedlink_core::FeedKey;
use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// A local media source attached to the outgoing connection.
pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// A media track received from the remote side.
pub type RemoteTrack = Arc<TrackRemote>;

/// External recording coordinator that receives a copy of the local media.
///
/// Calls are fire-and-forget: a session never waits for recording to start or finish.
pub trait RecordingSink: Send + Sync + 'static {
    fn start_recording(&self, feed_key: &FeedKey, tracks: Vec<LocalTrack>);

    fn stop_recording(&self, feed_key: &FeedKey);
}

/// Callback fired for each remote track.
pub type RemoteTrackCallback = Box<dyn Fn(RemoteTrack) + Send + Sync + 'static>;
