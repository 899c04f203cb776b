//! Pool configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default pending pool byte cap.
pub const DEFAULT_PENDING_POOL_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Default transaction expiration window.
pub const DEFAULT_EXPIRATION_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Default grace for client clocks running ahead of ours.
pub const DEFAULT_FUTURE_TIMESTAMP_GRACE: Duration = Duration::from_secs(3 * 60);

/// Transaction pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MempoolConfig {
    /// Total-size-in-bytes cap of the pending pool. Insertion past the cap
    /// is a congestion error.
    #[serde(default = "default_pool_size")]
    pub pending_pool_size_bytes: usize,

    /// How long a transaction stays relevant. Anchors both the validation
    /// window and the sweepers.
    #[serde(default = "default_expiration_window", with = "serde_secs")]
    pub expiration_window: Duration,

    /// How far into the future a transaction timestamp may point.
    #[serde(default = "default_future_grace", with = "serde_secs")]
    pub future_timestamp_grace: Duration,

    /// Pending pool sweeper tick.
    #[serde(default = "default_pending_sweep", with = "serde_secs")]
    pub pending_sweep_interval: Duration,

    /// Committed pool sweeper tick.
    #[serde(default = "default_committed_sweep", with = "serde_secs")]
    pub committed_sweep_interval: Duration,
}

fn default_pool_size() -> usize {
    DEFAULT_PENDING_POOL_SIZE_BYTES
}

fn default_expiration_window() -> Duration {
    DEFAULT_EXPIRATION_WINDOW
}

fn default_future_grace() -> Duration {
    DEFAULT_FUTURE_TIMESTAMP_GRACE
}

fn default_pending_sweep() -> Duration {
    Duration::from_secs(10)
}

fn default_committed_sweep() -> Duration {
    Duration::from_secs(30)
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            pending_pool_size_bytes: default_pool_size(),
            expiration_window: default_expiration_window(),
            future_timestamp_grace: default_future_grace(),
            pending_sweep_interval: default_pending_sweep(),
            committed_sweep_interval: default_committed_sweep(),
        }
    }
}

mod serde_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MempoolConfig::default();
        assert_eq!(config.pending_pool_size_bytes, 20 * 1024 * 1024);
        assert_eq!(config.expiration_window, Duration::from_secs(1800));
    }
}
