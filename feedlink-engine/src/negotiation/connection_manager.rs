use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::media::{LocalTrack, RecordingSink, RemoteTrack, RemoteTrackCallback};
use crate::negotiation::candidate_buffer::CandidateBuffer;
use crate::negotiation::remote_tracks::RemoteTracks;
use crate::negotiation::state_observer::{StateObserver, StatePublisher};
use crate::transport::{PeerTransport, TransportEvent, TransportEventSink, TransportFactory};
use feedlink_core::{
    ConnectionState, FeedKey, IceCandidatePayload, NegotiationRole, SessionDescription,
};
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns the peer connection of one feed and drives its offer/answer/candidate lifecycle.
///
/// Exactly one underlying connection exists at a time. [`restart`](Self::restart) and
/// [`reset_attempt`](Self::reset_attempt) close it before its replacement receives any track.
pub struct ConnectionManager {
    feed_key: FeedKey,
    role: NegotiationRole,
    factory: Arc<dyn TransportFactory>,
    events_tx: mpsc::Sender<TransportEvent>,
    transport: Option<Box<dyn PeerTransport>>,
    generation: u64,

    local_description_set: bool,
    remote_description_set: bool,
    offer_outstanding: bool,
    candidates: CandidateBuffer,

    state: StatePublisher,
    local_tracks: Vec<LocalTrack>,
    remote_tracks: RemoteTracks<RemoteTrack>,
    recorder: Option<Arc<dyn RecordingSink>>,
    closed: bool,
}

impl ConnectionManager {
    /// Creates the manager together with its first underlying connection, whose events are
    /// delivered to `events_tx`.
    pub async fn new(
        feed_key: FeedKey,
        role: NegotiationRole,
        config: &SessionConfig,
        factory: Arc<dyn TransportFactory>,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> SessionResult<Self> {
        let generation = 1;
        let transport = factory
            .create(TransportEventSink::new(generation, events_tx.clone()))
            .await
            .map_err(SessionError::transport)?;

        info!(feed = %feed_key, %role, "Connection manager created");

        Ok(Self {
            feed_key,
            role,
            factory,
            events_tx,
            transport: Some(transport),
            generation,
            local_description_set: false,
            remote_description_set: false,
            offer_outstanding: false,
            candidates: CandidateBuffer::new(),
            state: StatePublisher::new(config.event_buffer),
            local_tracks: Vec::new(),
            remote_tracks: RemoteTracks::new(generation),
            recorder: None,
            closed: false,
        })
    }

    pub fn set_recorder(&mut self, recorder: Arc<dyn RecordingSink>) {
        self.recorder = Some(recorder);
    }

    pub fn feed_key(&self) -> &FeedKey {
        &self.feed_key
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `generation` names the connection currently in use.
    pub fn is_current(&self, generation: u64) -> bool {
        !self.closed && generation == self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn buffered_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn observer(&self) -> StateObserver {
        self.state.observer()
    }

    pub fn observe_state(&self) -> BoxStream<'static, ConnectionState> {
        self.state.observer().observe()
    }

    /// Creates the local offer and sets it as local description.
    pub async fn start_as_offerer(&mut self) -> SessionResult<SessionDescription> {
        self.expect_role(NegotiationRole::Offerer, "start_as_offerer")?;
        if self.local_description_set {
            return Err(SessionError::Negotiation(
                "local offer already created for this attempt".into(),
            ));
        }

        self.state.publish(ConnectionState::Negotiating);
        self.create_local_offer(false).await
    }

    /// Applies the remote offer, answers it and flushes candidates that arrived early.
    pub async fn start_as_answerer(
        &mut self,
        remote_offer: SessionDescription,
    ) -> SessionResult<SessionDescription> {
        self.expect_role(NegotiationRole::Answerer, "start_as_answerer")?;
        if self.remote_description_set {
            return Err(SessionError::Negotiation(
                "remote offer already applied for this attempt".into(),
            ));
        }

        self.state.publish(ConnectionState::Negotiating);

        let transport = self.transport.as_deref().ok_or(SessionError::Closed)?;
        transport
            .set_remote_description(remote_offer)
            .await
            .map_err(SessionError::transport)?;
        self.remote_description_set = true;

        let answer = transport
            .create_answer()
            .await
            .map_err(SessionError::transport)?;
        transport
            .set_local_description(answer.clone())
            .await
            .map_err(SessionError::transport)?;
        self.local_description_set = true;

        self.flush_candidates().await?;
        debug!(feed = %self.feed_key, generation = self.generation, "Answer created");
        Ok(answer)
    }

    /// Applies the answer to the outstanding local offer and flushes buffered candidates.
    pub async fn apply_remote_answer(&mut self, answer: SessionDescription) -> SessionResult<()> {
        self.expect_role(NegotiationRole::Offerer, "apply_remote_answer")?;
        // A second answer finds its offer already answered.
        if !self.offer_outstanding {
            return Err(SessionError::Ordering(
                "no local offer is outstanding".into(),
            ));
        }
        if self.remote_description_set {
            return Err(SessionError::Negotiation(
                "remote answer already applied for this attempt".into(),
            ));
        }
        let state = self.state.current();
        if state != ConnectionState::Negotiating {
            return Err(SessionError::Ordering(format!(
                "cannot apply an answer while {state}"
            )));
        }

        self.transport()?
            .set_remote_description(answer)
            .await
            .map_err(SessionError::transport)?;
        self.remote_description_set = true;
        self.offer_outstanding = false;

        self.flush_candidates().await?;
        debug!(feed = %self.feed_key, generation = self.generation, "Remote answer applied");
        Ok(())
    }

    /// Applies a remote candidate, or buffers it until the remote description is set.
    /// Problems are logged and never surfaced.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidatePayload) {
        if self.closed {
            debug!(feed = %self.feed_key, "Candidate ignored, connection closed");
            return;
        }
        if !candidate.is_usable() {
            warn!(feed = %self.feed_key, ?candidate, "Dropping malformed ICE candidate");
            return;
        }

        if !self.remote_description_set {
            self.candidates.push(candidate);
            debug!(
                feed = %self.feed_key,
                buffered = self.candidates.len(),
                "Candidate buffered until remote description is set"
            );
            return;
        }

        self.apply_candidate(candidate).await;
    }

    /// Replaces the underlying connection and issues a new offer for a fresh attempt.
    pub async fn restart(&mut self, ice_restart: bool) -> SessionResult<SessionDescription> {
        self.expect_role(NegotiationRole::Offerer, "restart")?;
        self.ensure_open()?;

        info!(feed = %self.feed_key, ice_restart, "Restarting negotiation");
        self.state.publish(ConnectionState::Reconnecting);
        self.replace_transport().await?;

        self.state.publish(ConnectionState::Negotiating);
        self.create_local_offer(ice_restart).await
    }

    /// Replaces the underlying connection so a fresh remote offer can be answered.
    pub async fn reset_attempt(&mut self) -> SessionResult<()> {
        self.ensure_open()?;

        info!(feed = %self.feed_key, role = %self.role, "Resetting negotiation attempt");
        self.state.publish(ConnectionState::Reconnecting);
        self.replace_transport().await
    }

    /// Gives up on an attempt whose descriptions never reached the remote side. The connection
    /// is replaced and the manager returns to `New`, ready to start again.
    pub async fn abandon_attempt(&mut self) -> SessionResult<()> {
        self.ensure_open()?;

        info!(feed = %self.feed_key, role = %self.role, "Abandoning negotiation attempt");
        self.replace_transport().await?;
        self.state.publish(ConnectionState::New);
        Ok(())
    }

    /// Adds local media to the connection, keeps it for restarts and hands a copy to the
    /// recorder.
    pub async fn attach_local_media(&mut self, tracks: Vec<LocalTrack>) -> SessionResult<()> {
        let transport = self.transport()?;
        for track in &tracks {
            transport
                .add_track(Arc::clone(track))
                .await
                .map_err(SessionError::transport)?;
        }

        if let Some(recorder) = &self.recorder {
            recorder.start_recording(&self.feed_key, tracks.clone());
        }

        info!(feed = %self.feed_key, count = tracks.len(), "Local media attached");
        self.local_tracks.extend(tracks);
        Ok(())
    }

    /// Registers a callback for remote tracks. Tracks received earlier are replayed to it.
    pub fn on_remote_track(&mut self, callback: RemoteTrackCallback) {
        self.remote_tracks.register(callback);
    }

    pub fn handle_remote_track(&mut self, generation: u64, track: RemoteTrack) {
        if self.closed || !self.remote_tracks.deliver(generation, track) {
            debug!(feed = %self.feed_key, generation, "Remote track ignored");
        }
    }

    pub fn mark_connected(&mut self) {
        if self.state.publish(ConnectionState::Connected) {
            info!(feed = %self.feed_key, generation = self.generation, "Connected");
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.state.publish(ConnectionState::Disconnected);
    }

    pub fn mark_reconnecting(&mut self) {
        self.state.publish(ConnectionState::Reconnecting);
    }

    /// Terminal failure: reconnection attempts are exhausted.
    pub fn fail(&mut self) {
        if self.state.publish(ConnectionState::Failed) {
            warn!(feed = %self.feed_key, "Connection failed, giving up");
        }
    }

    /// Stops media, releases the connection and moves to `Closed`. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if !self.local_tracks.is_empty()
            && let Some(recorder) = &self.recorder
        {
            recorder.stop_recording(&self.feed_key);
        }
        self.local_tracks.clear();
        self.remote_tracks.clear();

        let discarded = self.candidates.reset();
        if discarded > 0 {
            debug!(feed = %self.feed_key, discarded, "Buffered candidates dropped on close");
        }

        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            warn!(feed = %self.feed_key, "Failed to close peer connection: {:#}", e);
        }

        self.state.publish(ConnectionState::Closed);
        info!(feed = %self.feed_key, "Connection closed");
    }

    async fn create_local_offer(&mut self, ice_restart: bool) -> SessionResult<SessionDescription> {
        let transport = self.transport()?;
        let offer = transport
            .create_offer(ice_restart)
            .await
            .map_err(SessionError::transport)?;
        transport
            .set_local_description(offer.clone())
            .await
            .map_err(SessionError::transport)?;

        self.local_description_set = true;
        self.offer_outstanding = true;
        debug!(feed = %self.feed_key, generation = self.generation, ice_restart, "Offer created");
        Ok(offer)
    }

    async fn replace_transport(&mut self) -> SessionResult<()> {
        if let Some(old) = self.transport.take()
            && let Err(e) = old.close().await
        {
            warn!(
                feed = %self.feed_key,
                generation = self.generation,
                "Failed to close superseded peer connection: {:#}", e
            );
        }

        self.generation += 1;
        self.local_description_set = false;
        self.remote_description_set = false;
        self.offer_outstanding = false;
        self.remote_tracks.advance(self.generation);

        let discarded = self.candidates.reset();
        if discarded > 0 {
            debug!(feed = %self.feed_key, discarded, "Discarded candidates of previous attempt");
        }

        let transport = self
            .factory
            .create(TransportEventSink::new(
                self.generation,
                self.events_tx.clone(),
            ))
            .await
            .map_err(SessionError::transport)?;

        for track in &self.local_tracks {
            transport
                .add_track(Arc::clone(track))
                .await
                .map_err(SessionError::transport)?;
        }

        self.transport = Some(transport);
        debug!(feed = %self.feed_key, generation = self.generation, "Peer connection replaced");
        Ok(())
    }

    async fn flush_candidates(&mut self) -> SessionResult<()> {
        let pending = self.candidates.drain()?;
        if !pending.is_empty() {
            debug!(feed = %self.feed_key, count = pending.len(), "Flushing buffered candidates");
        }
        for candidate in pending {
            self.apply_candidate(candidate).await;
        }
        Ok(())
    }

    async fn apply_candidate(&self, candidate: IceCandidatePayload) {
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            let err = SessionError::Candidate(format!("{e:#}"));
            warn!(feed = %self.feed_key, generation = self.generation, "{}", err);
        }
    }

    fn transport(&self) -> SessionResult<&dyn PeerTransport> {
        self.transport.as_deref().ok_or(SessionError::Closed)
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn expect_role(&self, expected: NegotiationRole, operation: &str) -> SessionResult<()> {
        self.ensure_open()?;
        if self.role != expected {
            return Err(SessionError::Ordering(format!(
                "{operation} is not valid for the {} role",
                self.role
            )));
        }
        Ok(())
    }
}
