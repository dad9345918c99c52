use crate::media::LocalTrack;
use crate::transport::TransportEventSink;
use anyhow::Result;
use async_trait::async_trait;
use feedlink_core::{IceCandidatePayload, SessionDescription};

/// The real-time engine underneath a feed session, treated as a black box.
///
/// One instance is one peer connection. Restarting negotiation means closing it and asking the
/// [`TransportFactory`] for a fresh one.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription>;

    /// Requires the remote offer to be set already.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()>;

    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Creates peer connections wired to report their events into `events`.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self, events: TransportEventSink) -> Result<Box<dyn PeerTransport>>;
}
