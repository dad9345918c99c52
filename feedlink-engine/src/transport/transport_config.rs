use feedlink_core::IceServerConfig;
use feedlink_core::utils::default_stun_urls;
use serde::Deserialize;

/// ICE configuration for every peer connection a session creates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: default_stun_urls(),
                username: None,
                credential: None,
            }],
        }
    }
}

impl TransportConfig {
    /// No ICE servers at all: host candidates only. Enough for loopback peers.
    pub fn host_only() -> Self {
        Self {
            ice_servers: Vec::new(),
        }
    }
}
