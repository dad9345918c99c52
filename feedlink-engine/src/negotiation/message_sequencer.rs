use feedlink_core::{SignalKind, SignalMessage};
use std::collections::HashSet;
use tracing::debug;

/// A relay message the session may now act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sequenced {
    /// A remote offer. `fresh_attempt` is set when it supersedes an offer already processed,
    /// i.e. the remote side restarted negotiation.
    Offer {
        message: SignalMessage,
        fresh_attempt: bool,
    },
    Answer(SignalMessage),
    Candidate(SignalMessage),
}

/// Releases relay messages in the order negotiation needs them, whatever order the relay
/// delivered them in.
///
/// Within one negotiation attempt: the offer first, then the answer, then candidates in
/// arrival order. Each offer and answer is released at most once per attempt; redundant
/// deliveries and messages older than the attempt are dropped.
#[derive(Debug, Default)]
pub struct MessageSequencer {
    queue: Vec<SignalMessage>,
    seen: HashSet<(SignalKind, u64)>,
    offer_processed_at: Option<u64>,
    answer_processed: bool,
    attempt_since: u64,
    processing: bool,
}

impl MessageSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a delivered message. Returns `false` if it was dropped as a duplicate or as
    /// belonging to an earlier attempt.
    pub fn enqueue(&mut self, message: SignalMessage) -> bool {
        let kind = message.kind();
        let timestamp = message.timestamp;

        if !self.seen.insert((kind, timestamp)) {
            debug!(feed = %message.feed_key, ?kind, timestamp, "Duplicate relay delivery dropped");
            return false;
        }

        let stale = match kind {
            SignalKind::Offer => self.offer_processed_at.is_some_and(|at| timestamp <= at),
            SignalKind::Answer | SignalKind::IceCandidate => timestamp < self.attempt_since,
        };
        if stale {
            debug!(
                feed = %message.feed_key,
                ?kind,
                timestamp,
                attempt_since = self.attempt_since,
                "Stale relay message dropped"
            );
            return false;
        }

        self.queue.push(message);
        true
    }

    /// Enters a processing pass. Returns `false` if a pass is already running; the caller must
    /// then leave the queue alone, the running pass will pick the new message up.
    pub fn begin_pass(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        true
    }

    pub fn end_pass(&mut self) {
        self.processing = false;
    }

    /// Releases the next message allowed by the ordering rules, if any.
    pub fn next_ready(&mut self) -> Option<Sequenced> {
        if let Some(sequenced) = self.take_offer() {
            return Some(sequenced);
        }

        if self.answer_processed {
            self.queue.retain(|m| m.kind() != SignalKind::Answer);
        } else if self.offer_processed_at.is_some() {
            if let Some(answer) = self.take_first(SignalKind::Answer) {
                self.answer_processed = true;
                self.queue.retain(|m| m.kind() != SignalKind::Answer);
                return Some(Sequenced::Answer(answer));
            }
        }

        if self.offer_processed_at.is_some() || self.answer_processed {
            return self
                .take_first(SignalKind::IceCandidate)
                .map(Sequenced::Candidate);
        }

        None
    }

    /// Records that this side produced the offer for a new attempt starting at `since`
    /// (the relay timestamp of that offer). Messages from before it are discarded.
    pub fn begin_local_attempt(&mut self, since: u64) {
        self.begin_attempt(since);
        self.offer_processed_at = Some(since);
    }

    /// Records that this side produced the answer of the current attempt.
    pub fn mark_local_answer(&mut self) {
        self.answer_processed = true;
        self.queue.retain(|m| m.kind() != SignalKind::Answer);
    }

    /// Forgets all attempt state, e.g. when the session is closed.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.seen.clear();
        self.offer_processed_at = None;
        self.answer_processed = false;
        self.attempt_since = 0;
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn offer_processed(&self) -> bool {
        self.offer_processed_at.is_some()
    }

    pub fn answer_processed(&self) -> bool {
        self.answer_processed
    }

    fn take_offer(&mut self) -> Option<Sequenced> {
        // Only the newest queued offer matters; older ones were superseded on the relay.
        let newest = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, m)| m.kind() == SignalKind::Offer)
            .max_by_key(|(_, m)| m.timestamp)
            .map(|(idx, _)| idx)?;
        let offer = self.queue.remove(newest);
        self.queue.retain(|m| m.kind() != SignalKind::Offer);

        match self.offer_processed_at {
            None => {
                self.offer_processed_at = Some(offer.timestamp);
                Some(Sequenced::Offer {
                    message: offer,
                    fresh_attempt: false,
                })
            }
            Some(at) if offer.timestamp > at => {
                self.begin_attempt(offer.timestamp);
                self.offer_processed_at = Some(offer.timestamp);
                Some(Sequenced::Offer {
                    message: offer,
                    fresh_attempt: true,
                })
            }
            Some(_) => None,
        }
    }

    fn take_first(&mut self, kind: SignalKind) -> Option<SignalMessage> {
        let idx = self.queue.iter().position(|m| m.kind() == kind)?;
        Some(self.queue.remove(idx))
    }

    fn begin_attempt(&mut self, since: u64) {
        let before = self.queue.len();
        self.queue
            .retain(|m| m.kind() == SignalKind::Offer || m.timestamp >= since);
        self.seen.retain(|(_, timestamp)| *timestamp >= since);
        self.answer_processed = false;
        self.attempt_since = since;

        let discarded = before - self.queue.len();
        if discarded > 0 {
            debug!(since, discarded, "Discarded messages from previous attempt");
        }
    }
}
