use crate::error::SessionResult;
use crate::media::{LocalTrack, RemoteTrackCallback};
use feedlink_core::SessionDescription;
use tokio::sync::oneshot;

/// Requests sent from a [`FeedSessionHandle`](crate::session::FeedSessionHandle) to its session.
pub enum SessionCommand {
    /// Add local media to the connection and hand a copy to the recorder.
    AttachLocalMedia {
        tracks: Vec<LocalTrack>,
        reply: oneshot::Sender<SessionResult<()>>,
    },

    /// Create, set and publish the local offer.
    StartAsOfferer {
        reply: oneshot::Sender<SessionResult<SessionDescription>>,
    },

    /// Answer a remote offer obtained outside the relay subscription and publish the answer.
    StartAsAnswerer {
        offer: SessionDescription,
        reply: oneshot::Sender<SessionResult<SessionDescription>>,
    },

    OnRemoteTrack { callback: RemoteTrackCallback },

    Close { reply: oneshot::Sender<()> },
}
