mod candidate_buffer;
mod connection_manager;
mod message_sequencer;
mod reconnection_policy;
mod remote_tracks;
mod state_observer;

pub use candidate_buffer::CandidateBuffer;
pub use connection_manager::ConnectionManager;
pub use message_sequencer::{MessageSequencer, Sequenced};
pub use reconnection_policy::{ReconnectDecision, ReconnectionPolicy};
pub use remote_tracks::RemoteTracks;
pub use state_observer::{StateObserver, StatePublisher};
