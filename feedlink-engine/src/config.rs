use crate::transport::TransportConfig;
use serde::Deserialize;
use std::time::Duration;

/// Everything a feed session needs besides its collaborators.
///
/// Every field has a default, so a partial JSON document is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    pub reconnect: ReconnectConfig,
    pub relay_retry: RelayRetryConfig,
    /// Capacity of the session's command and event channels.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            relay_retry: RelayRetryConfig::default(),
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub disconnect_grace_period_ms: u64,
}

impl ReconnectConfig {
    pub fn disconnect_grace_period(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_period_ms)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            disconnect_grace_period_ms: 5_000,
        }
    }
}

/// Bounded retry for relay writes that fail with a retryable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayRetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl RelayRetryConfig {
    /// Delay before retry number `retry` (zero-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1 << retry.min(16)))
    }
}

impl Default for RelayRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
        }
    }
}
