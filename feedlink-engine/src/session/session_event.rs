use crate::media::RemoteTrack;
use crate::negotiation::Sequenced;
use crate::transport::{TransportEvent, TransportEventKind};
use feedlink_core::{IceCandidatePayload, SessionDescription, SignalPayload, TransportState};
use tracing::warn;

/// Everything a session reacts to besides caller commands, processed one at a time.
pub enum SessionEvent {
    /// A remote offer released by the sequencer. `timestamp` is its relay timestamp.
    OfferReceived {
        offer: SessionDescription,
        timestamp: u64,
        fresh_attempt: bool,
    },
    AnswerReceived {
        answer: SessionDescription,
        timestamp: u64,
    },
    CandidateReceived {
        candidate: IceCandidatePayload,
        timestamp: u64,
    },
    TransportStateChanged {
        generation: u64,
        state: TransportState,
    },
    LocalCandidate {
        generation: u64,
        candidate: IceCandidatePayload,
    },
    RemoteTrack {
        generation: u64,
        track: RemoteTrack,
    },
    GraceTimerFired {
        epoch: u64,
    },
}

impl SessionEvent {
    /// Converts a released relay message. A payload that does not match its release slot is
    /// dropped.
    pub fn from_sequenced(sequenced: Sequenced) -> Option<Self> {
        match sequenced {
            Sequenced::Offer {
                message,
                fresh_attempt,
            } => match message.payload {
                SignalPayload::Offer(offer) => Some(SessionEvent::OfferReceived {
                    offer,
                    timestamp: message.timestamp,
                    fresh_attempt,
                }),
                other => mismatched("offer", other),
            },
            Sequenced::Answer(message) => match message.payload {
                SignalPayload::Answer(answer) => Some(SessionEvent::AnswerReceived {
                    answer,
                    timestamp: message.timestamp,
                }),
                other => mismatched("answer", other),
            },
            Sequenced::Candidate(message) => match message.payload {
                SignalPayload::IceCandidate(candidate) => Some(SessionEvent::CandidateReceived {
                    candidate,
                    timestamp: message.timestamp,
                }),
                other => mismatched("candidate", other),
            },
        }
    }
}

impl From<TransportEvent> for SessionEvent {
    fn from(event: TransportEvent) -> Self {
        let generation = event.generation;
        match event.kind {
            TransportEventKind::StateChanged(state) => {
                SessionEvent::TransportStateChanged { generation, state }
            }
            TransportEventKind::CandidateGenerated(candidate) => SessionEvent::LocalCandidate {
                generation,
                candidate,
            },
            TransportEventKind::TrackAdded(track) => SessionEvent::RemoteTrack { generation, track },
        }
    }
}

fn mismatched(slot: &str, payload: SignalPayload) -> Option<SessionEvent> {
    warn!(slot, kind = ?payload.kind(), "Sequenced message does not match its slot");
    None
}
