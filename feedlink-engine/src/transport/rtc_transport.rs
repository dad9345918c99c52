use crate::media::{LocalTrack, RemoteTrack};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::{TransportEventKind, TransportEventSink};
use crate::transport::{PeerTransport, TransportFactory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use feedlink_core::{IceCandidatePayload, SessionDescription, TransportState};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;

/// [`PeerTransport`] backed by a webrtc-rs peer connection.
pub struct RtcTransport {
    generation: u64,
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcTransport {
    /// Builds a peer connection and routes its callbacks into `events`.
    pub async fn new(config: &TransportConfig, events: TransportEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );
        let generation = events.generation();

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();

                Box::pin(async move {
                    info!(generation = events.generation(), "Peer connection state: {:?}", s);
                    events
                        .emit(TransportEventKind::StateChanged(TransportState::from(s)))
                        .await;
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events
                    .emit(TransportEventKind::CandidateGenerated(
                        IceCandidatePayload::from(init),
                    ))
                    .await;
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: RemoteTrack,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();

                Box::pin(async move {
                    debug!(
                        generation = events.generation(),
                        "Remote {} track '{}' added",
                        track.kind(),
                        track.id()
                    );
                    events.emit(TransportEventKind::TrackAdded(track)).await;
                })
            },
        ));

        Ok(Self {
            generation,
            peer_connection,
        })
    }

    fn describe(desc: &RTCSessionDescription) -> Result<SessionDescription> {
        SessionDescription::from_rtc(desc)
            .context("Transport produced an unsupported description type")
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription> {
        let options = RTCOfferOptions {
            ice_restart,
            ..Default::default()
        };
        let offer = self
            .peer_connection
            .create_offer(Some(options))
            .await
            .context("Failed to create offer")?;
        Self::describe(&offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        Self::describe(&answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = RTCSessionDescription::try_from(desc)?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .context("Failed to set local description")?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = RTCSessionDescription::try_from(desc)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(RTCIceCandidateInit::from(candidate))
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        self.peer_connection
            .add_track(track)
            .await
            .context("Failed to add local track")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        debug!(generation = self.generation, "Closing peer connection");
        self.peer_connection.close().await?;
        Ok(())
    }
}

/// Creates one [`RtcTransport`] per negotiation attempt.
#[derive(Clone, Default)]
pub struct RtcTransportFactory {
    config: TransportConfig,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(&self, events: TransportEventSink) -> Result<Box<dyn PeerTransport>> {
        let transport = RtcTransport::new(&self.config, events).await?;
        Ok(Box::new(transport))
    }
}
