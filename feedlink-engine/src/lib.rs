//! Negotiation engine for one-to-one live feeds: a broadcaster offers, a viewer answers, and
//! both exchange their messages through a relay document per feed.

pub mod config;
pub mod error;
pub mod media;
pub mod negotiation;
pub mod session;
pub mod signaling;
pub mod transport;

pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
