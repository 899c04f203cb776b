//! The pluggable consensus-algorithm boundary.

use crate::config::ConsensusConfig;
use crate::context::ConsensusContext;
use crate::state::ConsensusState;
use orbit_core::Action;
use orbit_mempool::MempoolState;
use orbit_messages::{BlockCommit, BlockProposal, BlockVote};
use orbit_storage::{BlockPersistence, StatePersistence};
use orbit_types::{BlockHeight, Federation, PrivateKey, ValidatorId};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Tag selecting the consensus algorithm at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmId {
    /// Leader proposes, validators vote, leader commits on quorum.
    #[default]
    Benchmark,
}

/// The consensus-algorithm boundary.
///
/// A small interface over proposal, vote, and commit handling; the node
/// routes events through it without knowing which algorithm runs. The
/// mempool is passed in by the caller - the node owns it and the algorithm
/// borrows it per event.
pub trait ConsensusAlgorithm: Send {
    /// Set the current time before each event.
    fn set_time(&mut self, now: Duration);

    /// Actions to arm at startup (the leader's proposal timer).
    fn startup_actions(&self) -> Vec<Action>;

    /// Proposal timer fired.
    fn on_proposal_timer(&mut self, pool: &mut MempoolState) -> Vec<Action>;

    /// A proposal arrived (`HandleProposedBlock`).
    fn on_block_proposal(&mut self, proposal: BlockProposal, pool: &MempoolState) -> Vec<Action>;

    /// A vote arrived (`HandleVote`).
    fn on_block_vote(&mut self, vote: BlockVote) -> Vec<Action>;

    /// A commit announcement arrived (`Commit`).
    fn on_block_commit(&mut self, commit: BlockCommit, pool: &MempoolState) -> Vec<Action>;

    /// A block was committed locally (by us or via sync); retry buffered
    /// proposals and advance bookkeeping.
    fn on_block_committed(&mut self, height: BlockHeight, pool: &MempoolState) -> Vec<Action>;

    /// Commit a block pair fetched by the sync driver.
    ///
    /// Runs the same chain-extension checks as the consensus commit path.
    fn commit_synced_block(
        &mut self,
        pair: orbit_types::BlockPair,
    ) -> Result<Vec<Action>, crate::context::BlockValidationError>;
}

/// Build the configured algorithm.
///
/// The registry is keyed by [`AlgorithmId`]; only the benchmark variant
/// ships, a BFT variant is an open slot.
#[allow(clippy::too_many_arguments)]
pub fn build_algorithm(
    config: ConsensusConfig,
    local_id: ValidatorId,
    federation: Federation,
    signing_key: PrivateKey,
    context: ConsensusContext,
    block_store: Arc<dyn BlockPersistence>,
    state_store: Arc<dyn StatePersistence>,
) -> Box<dyn ConsensusAlgorithm> {
    match config.algorithm {
        AlgorithmId::Benchmark => Box::new(ConsensusState::new(
            config,
            local_id,
            federation,
            signing_key,
            context,
            block_store,
            state_store,
        )),
    }
}
