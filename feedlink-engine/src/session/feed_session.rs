use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::media::RecordingSink;
use crate::negotiation::{
    ConnectionManager, MessageSequencer, ReconnectDecision, ReconnectionPolicy,
};
use crate::session::session_command::SessionCommand;
use crate::session::session_event::SessionEvent;
use crate::session::session_handle::FeedSessionHandle;
use crate::signaling::{Relay, SignalingChannel};
use crate::transport::{TransportEvent, TransportFactory};
use feedlink_core::{
    ConnectionState, FeedKey, NegotiationRole, SessionDescription, SignalMessage, SignalPayload,
    TransportState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The actor driving one feed: exactly one connection manager and one signaling channel.
///
/// Caller commands, relay messages, transport events and the grace timer all funnel into
/// [`run`](Self::run), which handles each to completion before taking the next.
pub struct FeedSession {
    feed_key: FeedKey,
    role: NegotiationRole,

    manager: ConnectionManager,
    channel: SignalingChannel,
    sequencer: MessageSequencer,
    policy: ReconnectionPolicy,

    /// Commands from handles; closes when every handle is dropped.
    command_rx: mpsc::Receiver<SessionCommand>,

    /// Decoded relay messages from the signaling channel.
    signal_rx: mpsc::Receiver<SignalMessage>,

    /// Events from the current (and superseded) peer connections.
    transport_rx: mpsc::Receiver<TransportEvent>,

    timer_tx: mpsc::Sender<u64>,
    timer_rx: mpsc::Receiver<u64>,
    grace_timer: Option<JoinHandle<()>>,
    timer_epoch: u64,

    /// SDP of the last remote offer answered, to recognise its relay echo.
    answered_offer: Option<String>,
}

impl FeedSession {
    /// Starts a session for `feed_key` and returns a handle to it.
    pub async fn spawn(
        config: SessionConfig,
        feed_key: FeedKey,
        role: NegotiationRole,
        relay: Arc<dyn Relay>,
        factory: Arc<dyn TransportFactory>,
    ) -> SessionResult<FeedSessionHandle> {
        Self::spawn_with_recorder(config, feed_key, role, relay, factory, None).await
    }

    /// Like [`spawn`](Self::spawn), handing local media to `recorder` as it is attached.
    pub async fn spawn_with_recorder(
        config: SessionConfig,
        feed_key: FeedKey,
        role: NegotiationRole,
        relay: Arc<dyn Relay>,
        factory: Arc<dyn TransportFactory>,
        recorder: Option<Arc<dyn RecordingSink>>,
    ) -> SessionResult<FeedSessionHandle> {
        let buffer = config.event_buffer.max(1);
        let (transport_tx, transport_rx) = mpsc::channel(buffer);
        let (signal_tx, signal_rx) = mpsc::channel(buffer);
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let (timer_tx, timer_rx) = mpsc::channel(8);

        let mut manager =
            ConnectionManager::new(feed_key.clone(), role, &config, factory, transport_tx).await?;
        if let Some(recorder) = recorder {
            manager.set_recorder(recorder);
        }

        let mut channel =
            SignalingChannel::new(feed_key.clone(), role, relay, config.relay_retry);
        if let Err(e) = channel.subscribe(signal_tx).await {
            manager.close().await;
            return Err(e.into());
        }

        let observer = manager.observer();
        let session = Self {
            feed_key: feed_key.clone(),
            role,
            manager,
            channel,
            sequencer: MessageSequencer::new(),
            policy: ReconnectionPolicy::new(config.reconnect),
            command_rx,
            signal_rx,
            transport_rx,
            timer_tx,
            timer_rx,
            grace_timer: None,
            timer_epoch: 0,
            answered_offer: None,
        };
        tokio::spawn(session.run());

        Ok(FeedSessionHandle::new(feed_key, role, command_tx, observer))
    }

    /// Main event loop. Returns once the session is closed.
    pub async fn run(mut self) {
        info!(feed = %self.feed_key, role = %self.role, "Feed session started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            if self.handle_command(c).await {
                                break;
                            }
                        }
                        None => {
                            info!(feed = %self.feed_key, "All handles dropped, closing session");
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                Some(message) = self.signal_rx.recv() => {
                    self.handle_signal(message).await;
                }

                Some(event) = self.transport_rx.recv() => {
                    self.dispatch(SessionEvent::from(event)).await;
                }

                Some(epoch) = self.timer_rx.recv() => {
                    self.dispatch(SessionEvent::GraceTimerFired { epoch }).await;
                }
            }
        }

        info!(feed = %self.feed_key, "Feed session finished");
    }

    /// Returns `true` once the session is closed.
    async fn handle_command(&mut self, cmd: SessionCommand) -> bool {
        match cmd {
            SessionCommand::AttachLocalMedia { tracks, reply } => {
                let result = self.manager.attach_local_media(tracks).await;
                let _ = reply.send(result);
            }
            SessionCommand::StartAsOfferer { reply } => {
                let result = self.start_as_offerer().await;
                self.rollback_unsent(&result).await;
                let _ = reply.send(result);
            }
            SessionCommand::StartAsAnswerer { offer, reply } => {
                let result = self.answer_offer(offer).await;
                self.rollback_unsent(&result).await;
                let _ = reply.send(result);
            }
            SessionCommand::OnRemoteTrack { callback } => {
                self.manager.on_remote_track(callback);
            }
            SessionCommand::Close { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn start_as_offerer(&mut self) -> SessionResult<SessionDescription> {
        let offer = self.manager.start_as_offerer().await?;
        let timestamp = self.channel.send(SignalPayload::Offer(offer.clone())).await?;
        self.sequencer.begin_local_attempt(timestamp);
        Ok(offer)
    }

    async fn answer_offer(&mut self, offer: SessionDescription) -> SessionResult<SessionDescription> {
        let offer_sdp = offer.sdp.clone();
        let answer = self.manager.start_as_answerer(offer).await?;
        self.answered_offer = Some(offer_sdp);
        self.sequencer.mark_local_answer();

        self.channel.send(SignalPayload::Answer(answer.clone())).await?;
        Ok(answer)
    }

    /// A caller-started attempt whose description never made it onto the relay is abandoned,
    /// so the caller can simply start again.
    async fn rollback_unsent<T>(&mut self, result: &SessionResult<T>) {
        let Err(SessionError::Relay(e)) = result else {
            return;
        };
        warn!(feed = %self.feed_key, "Description not published, abandoning attempt: {}", e);
        self.answered_offer = None;
        self.sequencer.clear();
        if let Err(e) = self.manager.abandon_attempt().await {
            error!(feed = %self.feed_key, "Failed to abandon attempt: {}", e);
        }
    }

    async fn handle_signal(&mut self, message: SignalMessage) {
        if !self.accepts_negotiation() {
            debug!(feed = %self.feed_key, kind = ?message.kind(), "Relay message ignored");
            return;
        }
        if !self.sequencer.enqueue(message) {
            return;
        }
        if !self.sequencer.begin_pass() {
            return;
        }
        while let Some(sequenced) = self.sequencer.next_ready() {
            if let Some(event) = SessionEvent::from_sequenced(sequenced) {
                self.dispatch(event).await;
            }
        }
        self.sequencer.end_pass();
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::OfferReceived {
                offer,
                timestamp,
                fresh_attempt,
            } => self.on_offer(offer, timestamp, fresh_attempt).await,

            SessionEvent::AnswerReceived { answer, timestamp } => {
                if self.role != NegotiationRole::Offerer {
                    debug!(feed = %self.feed_key, timestamp, "Answer ignored by answerer");
                    return;
                }
                if let Err(e) = self.manager.apply_remote_answer(answer).await {
                    warn!(feed = %self.feed_key, timestamp, "Remote answer not applied: {}", e);
                    self.attempt_failed().await;
                }
            }

            SessionEvent::CandidateReceived { candidate, .. } => {
                self.manager.add_remote_candidate(candidate).await;
            }

            SessionEvent::TransportStateChanged { generation, state } => {
                if !self.manager.is_current(generation) {
                    debug!(feed = %self.feed_key, generation, ?state, "Stale transport state ignored");
                    return;
                }
                if !self.accepts_negotiation() {
                    return;
                }
                self.on_transport_state(state).await;
            }

            SessionEvent::LocalCandidate {
                generation,
                candidate,
            } => {
                if !self.manager.is_current(generation) {
                    return;
                }
                if let Err(e) = self.channel.send(SignalPayload::IceCandidate(candidate)).await {
                    warn!(feed = %self.feed_key, "Local candidate not published: {}", e);
                }
            }

            SessionEvent::RemoteTrack { generation, track } => {
                self.manager.handle_remote_track(generation, track);
            }

            SessionEvent::GraceTimerFired { epoch } => {
                if epoch != self.timer_epoch || self.manager.is_closed() {
                    return;
                }
                self.grace_timer = None;
                let decision = self.policy.on_grace_expired();
                self.apply_decision(decision).await;
            }
        }
    }

    async fn on_offer(&mut self, offer: SessionDescription, timestamp: u64, fresh_attempt: bool) {
        if self.role != NegotiationRole::Answerer {
            warn!(feed = %self.feed_key, timestamp, "Remote offer ignored by offerer");
            return;
        }
        if self.answered_offer.as_deref() == Some(offer.sdp.as_str()) {
            debug!(feed = %self.feed_key, timestamp, "Offer already answered");
            return;
        }

        if fresh_attempt || self.manager.remote_description_set() {
            info!(feed = %self.feed_key, timestamp, "Remote side renegotiated");
            self.cancel_grace_timer();
            if let Err(e) = self.manager.reset_attempt().await {
                error!(feed = %self.feed_key, "Failed to reset connection: {}", e);
                self.attempt_failed().await;
                return;
            }
        }

        match self.answer_offer(offer).await {
            Ok(_) => debug!(feed = %self.feed_key, timestamp, "Remote offer answered"),
            Err(e) => {
                warn!(feed = %self.feed_key, timestamp, "Failed to answer remote offer: {}", e);
                self.attempt_failed().await;
            }
        }
    }

    async fn on_transport_state(&mut self, state: TransportState) {
        match state {
            TransportState::Connected => {
                self.cancel_grace_timer();
                self.policy.on_connected();
                self.manager.mark_connected();
            }
            TransportState::Disconnected => {
                self.manager.mark_disconnected();
                let decision = self.policy.on_disconnected();
                self.apply_decision(decision).await;
            }
            TransportState::Failed => {
                self.cancel_grace_timer();
                let decision = self.policy.on_failed();
                self.apply_decision(decision).await;
            }
            TransportState::New | TransportState::Connecting | TransportState::Closed => {
                debug!(feed = %self.feed_key, ?state, "Transport state");
            }
        }
    }

    /// A recovery step itself failed. Counts against the attempt budget.
    async fn attempt_failed(&mut self) {
        let decision = self.policy.on_failed();
        self.apply_decision(decision).await;
    }

    async fn apply_decision(&mut self, mut decision: ReconnectDecision) {
        loop {
            match decision {
                ReconnectDecision::Ignore => return,
                ReconnectDecision::Wait(delay) => {
                    self.arm_grace_timer(delay);
                    return;
                }
                ReconnectDecision::GiveUp => {
                    self.cancel_grace_timer();
                    self.manager.fail();
                    return;
                }
                ReconnectDecision::Restart { attempt } => match self.role {
                    NegotiationRole::Offerer => match self.restart(attempt).await {
                        Ok(()) => return,
                        Err(e) => {
                            warn!(feed = %self.feed_key, attempt, "Reconnection attempt failed: {}", e);
                            decision = self.policy.on_failed();
                        }
                    },
                    NegotiationRole::Answerer => {
                        info!(feed = %self.feed_key, attempt, "Waiting for the offerer to renegotiate");
                        self.manager.mark_reconnecting();
                        let delay = self.policy.rearm();
                        self.arm_grace_timer(delay);
                        return;
                    }
                },
            }
        }
    }

    async fn restart(&mut self, attempt: u32) -> SessionResult<()> {
        info!(feed = %self.feed_key, attempt, "Reconnecting");
        let offer = self.manager.restart(true).await?;
        let timestamp = self.channel.send(SignalPayload::Offer(offer)).await?;
        self.sequencer.begin_local_attempt(timestamp);
        Ok(())
    }

    fn arm_grace_timer(&mut self, delay: Duration) {
        self.abort_grace_timer();
        let epoch = self.timer_epoch;
        let timer_tx = self.timer_tx.clone();

        self.grace_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(epoch).await;
        }));
        debug!(feed = %self.feed_key, epoch, delay_ms = delay.as_millis() as u64, "Grace timer armed");
    }

    fn cancel_grace_timer(&mut self) {
        self.abort_grace_timer();
        self.policy.disarm();
    }

    fn abort_grace_timer(&mut self) {
        // Bumping the epoch also invalidates a firing already queued.
        self.timer_epoch += 1;
        if let Some(timer) = self.grace_timer.take() {
            timer.abort();
        }
    }

    fn accepts_negotiation(&self) -> bool {
        !matches!(
            self.manager.state(),
            ConnectionState::Failed | ConnectionState::Closed
        )
    }

    async fn shutdown(&mut self) {
        if self.manager.is_closed() {
            return;
        }
        self.cancel_grace_timer();
        self.channel.unsubscribe().await;
        self.sequencer.clear();
        self.manager.close().await;
    }
}
