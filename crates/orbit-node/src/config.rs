//! Node configuration.

use crate::sync::SyncConfig;
use orbit_consensus::ConsensusConfig;
use orbit_mempool::MempoolConfig;
use orbit_types::{Federation, ValidatorId, VirtualChainId};

/// Everything a node needs to join its federation.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// This node's federation position.
    pub local_id: ValidatorId,
    /// The chain this node serves.
    pub virtual_chain_id: VirtualChainId,
    /// The static federation.
    pub federation: Federation,
    /// Transaction pool settings.
    pub mempool: MempoolConfig,
    /// Consensus settings.
    pub consensus: ConsensusConfig,
    /// Block sync settings.
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// A config with default subsystem settings.
    pub fn new(
        local_id: ValidatorId,
        virtual_chain_id: VirtualChainId,
        federation: Federation,
    ) -> Self {
        Self {
            local_id,
            virtual_chain_id,
            federation,
            mempool: MempoolConfig::default(),
            consensus: ConsensusConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}
