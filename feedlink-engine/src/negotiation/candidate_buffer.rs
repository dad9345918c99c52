use crate::error::{SessionError, SessionResult};
use feedlink_core::IceCandidatePayload;

/// Remote candidates that arrived before the current attempt's remote description.
///
/// Append-only until drained; drained at most once per negotiation attempt.
#[derive(Debug, Default)]
pub struct CandidateBuffer {
    pending: Vec<IceCandidatePayload>,
    drained: bool,
}

impl CandidateBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, candidate: IceCandidatePayload) {
        self.pending.push(candidate);
    }

    /// Hands out everything buffered, in arrival order, and empties the buffer.
    pub fn drain(&mut self) -> SessionResult<Vec<IceCandidatePayload>> {
        if self.drained {
            return Err(SessionError::Negotiation(
                "candidate buffer already drained for this attempt".into(),
            ));
        }
        self.drained = true;
        Ok(std::mem::take(&mut self.pending))
    }

    /// Starts a new attempt. Candidates still pending belong to the old one and are discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        self.drained = false;
        discarded
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }
}
