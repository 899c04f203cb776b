//! Vote tracking for one proposed block.

use orbit_messages::BlockVote;
use orbit_types::{verify_signature, BlockHeight, Federation, Hash, ValidatorId};
use std::collections::HashMap;
use thiserror::Error;

/// Why a vote was not counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    /// The vote is for a different block or height.
    #[error("vote targets a different block")]
    WrongBlock,

    /// The voter is not a federation member.
    #[error("unknown validator {0}")]
    UnknownValidator(ValidatorId),

    /// The vote signature does not verify.
    #[error("invalid vote signature from {0}")]
    InvalidSignature(ValidatorId),

    /// Valid votes fell short of the quorum threshold.
    #[error("quorum not reached: {votes} of {required} votes")]
    QuorumNotReached {
        /// Distinct valid votes counted.
        votes: usize,
        /// The federation threshold.
        required: usize,
    },
}

/// Collected votes for one block hash at one height.
///
/// Deduplicates by voter; a member's later vote for the same block is
/// idempotent.
#[derive(Debug)]
pub struct VoteSet {
    block_hash: Hash,
    height: BlockHeight,
    votes: HashMap<ValidatorId, BlockVote>,
}

impl VoteSet {
    /// Start collecting votes for a block.
    pub fn new(block_hash: Hash, height: BlockHeight) -> Self {
        Self {
            block_hash,
            height,
            votes: HashMap::new(),
        }
    }

    /// The block being voted on.
    pub fn block_hash(&self) -> Hash {
        self.block_hash
    }

    /// Verify and record a vote. Returns `true` when the vote was new.
    pub fn add_vote(&mut self, vote: BlockVote, federation: &Federation) -> Result<bool, VoteError> {
        if vote.block_hash != self.block_hash || vote.height != self.height {
            return Err(VoteError::WrongBlock);
        }

        let Some(public_key) = federation.public_key(vote.voter) else {
            return Err(VoteError::UnknownValidator(vote.voter));
        };

        let message = BlockVote::signing_message(vote.height, &vote.block_hash);
        verify_signature(public_key, &message, &vote.signature)
            .map_err(|_| VoteError::InvalidSignature(vote.voter))?;

        Ok(self.votes.insert(vote.voter, vote).is_none())
    }

    /// Number of distinct voters counted.
    pub fn count(&self) -> usize {
        self.votes.len()
    }

    /// Whether the federation quorum threshold is met.
    pub fn has_quorum(&self, federation: &Federation) -> bool {
        self.count() >= federation.quorum_threshold()
    }

    /// The collected votes, ordered by voter id. Used as commit evidence.
    pub fn votes(&self) -> Vec<BlockVote> {
        let mut votes: Vec<_> = self.votes.values().cloned().collect();
        votes.sort_by_key(|v| v.voter);
        votes
    }
}

/// Verify a commit announcement's vote evidence against the federation.
///
/// Distinct federation voters with valid signatures over this block hash
/// must reach the quorum threshold.
pub fn verify_commit_evidence(
    block_hash: Hash,
    height: BlockHeight,
    votes: &[BlockVote],
    federation: &Federation,
) -> Result<(), VoteError> {
    let mut set = VoteSet::new(block_hash, height);
    for vote in votes {
        set.add_vote(vote.clone(), federation)?;
    }
    if !set.has_quorum(federation) {
        return Err(VoteError::QuorumNotReached {
            votes: set.count(),
            required: federation.quorum_threshold(),
        });
    }
    Ok(())
}
