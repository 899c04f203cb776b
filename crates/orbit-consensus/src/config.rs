//! Consensus configuration.

use crate::algorithm::AlgorithmId;
use serde::Deserialize;
use std::time::Duration;

/// Consensus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Which algorithm drives block production.
    #[serde(default)]
    pub algorithm: AlgorithmId,

    /// Leader proposal attempt cadence.
    #[serde(default = "default_proposal_interval", with = "serde_millis")]
    pub proposal_interval: Duration,

    /// Cap on transactions per block.
    #[serde(default = "default_max_txs")]
    pub max_transactions_per_block: usize,

    /// Cap on a block's transaction bytes.
    #[serde(default = "default_max_block_bytes")]
    pub max_block_size_bytes: usize,

    /// How long a proposal whose predecessor has not been observed yet may
    /// wait in the buffer before it is dropped.
    #[serde(default = "default_proposal_grace", with = "serde_millis")]
    pub proposal_grace: Duration,

    /// Whether the leader proposes blocks with no transactions.
    #[serde(default)]
    pub propose_empty_blocks: bool,
}

fn default_proposal_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_max_txs() -> usize {
    100
}

fn default_max_block_bytes() -> usize {
    1024 * 1024
}

fn default_proposal_grace() -> Duration {
    Duration::from_secs(5)
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            algorithm: AlgorithmId::default(),
            proposal_interval: default_proposal_interval(),
            max_transactions_per_block: default_max_txs(),
            max_block_size_bytes: default_max_block_bytes(),
            proposal_grace: default_proposal_grace(),
            propose_empty_blocks: false,
        }
    }
}

mod serde_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
