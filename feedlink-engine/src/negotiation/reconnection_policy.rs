use crate::config::ReconnectConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// What the session should do after a transport state change or a grace period expiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Start (or keep) the grace timer and see whether the connection recovers.
    Wait(Duration),
    /// Start recovery attempt number `attempt` (1-based).
    Restart { attempt: u32 },
    /// Attempts are exhausted.
    GiveUp,
    /// Nothing to do.
    Ignore,
}

/// Bounded reconnection bookkeeping for one session.
///
/// A disconnect starts a grace period; if it expires without the connection recovering, or
/// the transport reports failure outright, a recovery attempt is counted. Reaching
/// `Connected` resets the count. Once `max_attempts` recoveries have been spent the policy
/// gives up.
#[derive(Debug)]
pub struct ReconnectionPolicy {
    config: ReconnectConfig,
    attempts: u32,
    timer_armed: bool,
}

impl ReconnectionPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            timer_armed: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn on_connected(&mut self) {
        if self.attempts > 0 {
            debug!(attempts = self.attempts, "Connection recovered, resetting attempts");
        }
        self.attempts = 0;
        self.timer_armed = false;
    }

    /// Transport reported `Disconnected`. Arms the grace timer unless one is running.
    pub fn on_disconnected(&mut self) -> ReconnectDecision {
        if self.timer_armed {
            return ReconnectDecision::Ignore;
        }
        self.timer_armed = true;
        ReconnectDecision::Wait(self.config.disconnect_grace_period())
    }

    /// The grace timer fired without the connection recovering.
    pub fn on_grace_expired(&mut self) -> ReconnectDecision {
        if !self.timer_armed {
            return ReconnectDecision::Ignore;
        }
        self.timer_armed = false;
        self.next_attempt()
    }

    /// Transport reported `Failed`; evaluated immediately, no grace period.
    pub fn on_failed(&mut self) -> ReconnectDecision {
        self.timer_armed = false;
        self.next_attempt()
    }

    /// Re-arms the grace timer while waiting for the remote side to recover the connection.
    pub fn rearm(&mut self) -> Duration {
        self.timer_armed = true;
        self.config.disconnect_grace_period()
    }

    /// Cancels a pending grace timer, e.g. on close.
    pub fn disarm(&mut self) {
        self.timer_armed = false;
    }

    fn next_attempt(&mut self) -> ReconnectDecision {
        if self.attempts >= self.config.max_attempts {
            warn!(
                attempts = self.attempts,
                max_attempts = self.config.max_attempts,
                "Reconnection attempts exhausted"
            );
            return ReconnectDecision::GiveUp;
        }
        self.attempts += 1;
        ReconnectDecision::Restart {
            attempt: self.attempts,
        }
    }
}
