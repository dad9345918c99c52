mod relay;
mod relay_hub;
mod signaling_channel;
mod ws_handler;

pub use relay::{Relay, RelaySubscription};
pub use relay_hub::RelayHub;
pub use signaling_channel::SignalingChannel;
pub use ws_handler::{relay_router, ws_handler};
