use feedlink_core::ConnectionState;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Write side of a session's connection state.
///
/// The current value and the transition feed are updated under the same lock, so an
/// observer that subscribes concurrently never sees a transition twice or out of order.
#[derive(Debug)]
pub struct StatePublisher {
    current: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
}

impl StatePublisher {
    pub fn new(capacity: usize) -> Self {
        let (current, _) = watch::channel(ConnectionState::New);
        let (transitions, _) = broadcast::channel(capacity.max(1));
        Self {
            current,
            transitions,
        }
    }

    pub fn current(&self) -> ConnectionState {
        *self.current.borrow()
    }

    /// Moves to `next`. Returns `false` when already there.
    pub fn publish(&self, next: ConnectionState) -> bool {
        self.current.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "Connection state changed");
            *state = next;
            // No receivers is fine, nobody is observing yet.
            let _ = self.transitions.send(next);
            true
        })
    }

    pub fn observer(&self) -> StateObserver {
        StateObserver {
            current: self.current.subscribe(),
            transitions: self.transitions.clone(),
        }
    }
}

/// Read side of a session's connection state, cheap to clone and usable from any task.
#[derive(Debug, Clone)]
pub struct StateObserver {
    current: watch::Receiver<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
}

struct ObserveCursor {
    initial: Option<ConnectionState>,
    rx: broadcast::Receiver<ConnectionState>,
    last: Option<ConnectionState>,
    finished: bool,
}

impl StateObserver {
    pub fn current(&self) -> ConnectionState {
        *self.current.borrow()
    }

    /// Stream of states: the current one first, then every transition in order.
    /// Ends after `Closed`.
    pub fn observe(&self) -> BoxStream<'static, ConnectionState> {
        let (initial, rx) = {
            let current = self.current.borrow();
            (*current, self.transitions.subscribe())
        };

        let cursor = ObserveCursor {
            initial: Some(initial),
            rx,
            last: None,
            finished: false,
        };

        stream::unfold(cursor, |mut cursor| async move {
            if cursor.finished {
                return None;
            }

            let next = match cursor.initial.take() {
                Some(state) => state,
                None => loop {
                    match cursor.rx.recv().await {
                        Ok(state) if cursor.last == Some(state) => continue,
                        Ok(state) => break state,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "State observer lagged behind");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                },
            };

            cursor.last = Some(next);
            cursor.finished = next.is_terminal();
            Some((next, cursor))
        })
        .boxed()
    }
}
