use anyhow::{Result, anyhow};
use async_trait::async_trait;
use feedlink_core::{IceCandidatePayload, SdpType, SessionDescription, TransportState};
use feedlink_engine::{
    LocalTrack, PeerTransport, TransportEventKind, TransportEventSink, TransportFactory,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use webrtc::track::track_local::TrackLocal;

/// One call made on a mock peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateOffer { ice_restart: bool },
    CreateAnswer,
    SetLocalDescription(SdpType),
    SetRemoteDescription(SdpType),
    AddIceCandidate(String),
    AddTrack(String),
    Close,
}

struct ConnectionRecord {
    generation: u64,
    sink: TransportEventSink,
    calls: Vec<TransportCall>,
}

#[derive(Default)]
struct MockState {
    connections: Vec<ConnectionRecord>,
    reject_candidates: bool,
    rejected_sdp: Vec<String>,
}

/// Transport factory whose connections only record what they are asked to do.
///
/// Tests drive the session by emitting transport events on a given generation.
#[derive(Clone, Default)]
pub struct MockTransportFactory {
    state: Arc<Mutex<MockState>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every connection refuse remote candidates.
    pub async fn reject_candidates(&self, reject: bool) {
        self.state.lock().await.reject_candidates = reject;
    }

    /// Make every connection refuse a remote description carrying `sdp`.
    pub async fn reject_remote_sdp(&self, sdp: &str) {
        self.state.lock().await.rejected_sdp.push(sdp.to_owned());
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn latest_generation(&self) -> Option<u64> {
        self.state
            .lock()
            .await
            .connections
            .last()
            .map(|c| c.generation)
    }

    pub async fn calls(&self, generation: u64) -> Vec<TransportCall> {
        self.state
            .lock()
            .await
            .connections
            .iter()
            .find(|c| c.generation == generation)
            .map(|c| c.calls.clone())
            .unwrap_or_default()
    }

    /// Candidates handed to the connection of `generation`, in order.
    pub async fn applied_candidates(&self, generation: u64) -> Vec<String> {
        self.calls(generation)
            .await
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::AddIceCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub async fn emit_state(&self, generation: u64, state: TransportState) {
        if let Some(sink) = self.sink(generation).await {
            sink.emit(TransportEventKind::StateChanged(state)).await;
        }
    }

    pub async fn emit_candidate(&self, generation: u64, candidate: &str) {
        if let Some(sink) = self.sink(generation).await {
            sink.emit(TransportEventKind::CandidateGenerated(
                IceCandidatePayload::new(candidate),
            ))
            .await;
        }
    }

    /// Wait until at least `count` connections were created.
    pub async fn wait_for_connections(&self, count: usize, timeout_ms: u64) -> bool {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            if self.connection_count().await >= count {
                return true;
            }
            if tokio::time::Instant::now() > deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    /// Wait until the connection of `generation` received `call`.
    pub async fn wait_for_call(
        &self,
        generation: u64,
        call: TransportCall,
        timeout_ms: u64,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            if self.calls(generation).await.contains(&call) {
                return true;
            }
            if tokio::time::Instant::now() > deadline {
                return false;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    async fn sink(&self, generation: u64) -> Option<TransportEventSink> {
        self.state
            .lock()
            .await
            .connections
            .iter()
            .find(|c| c.generation == generation)
            .map(|c| c.sink.clone())
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn create(&self, events: TransportEventSink) -> Result<Box<dyn PeerTransport>> {
        let generation = events.generation();
        tracing::debug!("[MockTransport] create generation {}", generation);

        self.state.lock().await.connections.push(ConnectionRecord {
            generation,
            sink: events,
            calls: Vec::new(),
        });

        Ok(Box::new(MockTransport {
            generation,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockTransport {
    generation: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    async fn record(&self, call: TransportCall) {
        let mut state = self.state.lock().await;
        if let Some(record) = state
            .connections
            .iter_mut()
            .find(|c| c.generation == self.generation)
        {
            record.calls.push(call);
        }
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn create_offer(&self, ice_restart: bool) -> Result<SessionDescription> {
        self.record(TransportCall::CreateOffer { ice_restart }).await;
        Ok(SessionDescription::offer(format!(
            "mock-offer-{}-{}",
            self.generation, ice_restart
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(TransportCall::CreateAnswer).await;
        Ok(SessionDescription::answer(format!(
            "mock-answer-{}",
            self.generation
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(TransportCall::SetLocalDescription(desc.sdp_type))
            .await;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        if self.state.lock().await.rejected_sdp.contains(&desc.sdp) {
            return Err(anyhow!("description refused by mock transport"));
        }
        self.record(TransportCall::SetRemoteDescription(desc.sdp_type))
            .await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidatePayload) -> Result<()> {
        if self.state.lock().await.reject_candidates {
            return Err(anyhow!("candidate refused by mock transport"));
        }
        self.record(TransportCall::AddIceCandidate(candidate.candidate))
            .await;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        self.record(TransportCall::AddTrack(track.id().to_string()))
            .await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close).await;
        Ok(())
    }
}
