use crate::media::RemoteTrack;
use feedlink_core::{IceCandidatePayload, TransportState};
use tokio::sync::mpsc;
use tracing::debug;

/// What a peer connection reports back to its session.
pub enum TransportEventKind {
    /// The underlying connection changed state.
    StateChanged(TransportState),

    /// A local candidate was gathered and must be sent to the remote side.
    CandidateGenerated(IceCandidatePayload),

    /// The remote side added a media track.
    TrackAdded(RemoteTrack),
}

/// A transport event tagged with the generation of the connection that produced it.
///
/// Each restart bumps the generation, so events still in flight from a closed connection
/// can be told apart from those of its replacement.
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

/// Sending half handed to a transport when it is created.
#[derive(Clone)]
pub struct TransportEventSink {
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
}

impl TransportEventSink {
    pub fn new(generation: u64, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn emit(&self, kind: TransportEventKind) {
        let event = TransportEvent {
            generation: self.generation,
            kind,
        };
        if self.tx.send(event).await.is_err() {
            debug!(
                generation = self.generation,
                "Transport event dropped, session is gone"
            );
        }
    }
}
