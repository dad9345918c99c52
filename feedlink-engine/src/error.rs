use thiserror::Error;

/// Failures of the external relay used to exchange signaling messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The relay could not be reached. Writes failing this way may be retried.
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    /// The relay refused the write.
    #[error("relay rejected write: {0}")]
    Rejected(String),

    #[error("failed to decode relay document: {0}")]
    Decode(String),

    #[error("relay subscription is gone")]
    Unsubscribed,
}

impl RelayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Unavailable(_))
    }
}

/// Errors surfaced by a feed session to its caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A negotiation step was repeated within one attempt (e.g. a second offer, a second
    /// remote description).
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// A negotiation step was invoked out of the required offer/answer/candidate sequence.
    #[error("ordering error: {0}")]
    Ordering(String),

    /// A connectivity candidate was malformed or refused. Logged and dropped internally.
    #[error("candidate rejected: {0}")]
    Candidate(String),

    #[error("transport failure: {0:#}")]
    Transport(anyhow::Error),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    pub(crate) fn transport(err: impl Into<anyhow::Error>) -> Self {
        SessionError::Transport(err.into())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
