pub use feedlink_core::model::{ConnectionState, FeedKey, NegotiationRole};

pub mod model {
    pub use feedlink_core::model::*;
    pub use feedlink_core::utils::default_stun_urls;
}

#[cfg(feature = "engine")]
pub mod engine {
    pub use feedlink_engine::*;
}
