mod feed;
mod relay;
#[cfg(not(target_arch = "wasm32"))]
mod rtc;
mod signaling;
mod state;
mod subscription;

pub use feed::FeedKey;
pub use relay::{RelayDocument, RelayPatch};
pub use signaling::{
    IceCandidatePayload, IceServerConfig, SdpType, SessionDescription, SignalKind, SignalMessage,
    SignalPayload,
};
pub use state::{ConnectionState, NegotiationRole, TransportState};
pub use subscription::SubscriptionId;
