//! Consensus for the Orbit node.
//!
//! Split in two:
//!
//! - the **consensus context** ([`ConsensusContext`]): assembles candidate
//!   block pairs on request and mirror-validates proposed ones;
//! - the **consensus algorithm** ([`ConsensusState`]): the leader-driven
//!   benchmark variant - leader proposes, validators vote, the leader
//!   commits and announces once the quorum threshold is met.
//!
//! The algorithm sits behind the small [`ConsensusAlgorithm`] trait with a
//! registry keyed by [`AlgorithmId`], leaving a slot for a BFT variant.

mod algorithm;
mod config;
mod context;
mod state;
mod vote_set;

pub use algorithm::{build_algorithm, AlgorithmId, ConsensusAlgorithm};
pub use config::ConsensusConfig;
pub use context::{BlockValidationError, ConsensusContext};
pub use state::ConsensusState;
pub use vote_set::{verify_commit_evidence, VoteError, VoteSet};
