//! Transaction relay and consensus gossip messages.

use orbit_types::{
    BlockHeight, BlockPair, GossipTopic, Hash, MessagePriority, NetworkMessage, Signature,
    SignedTransaction, ValidatorId,
};
use sbor::prelude::BasicSbor;

/// A batch of signed transactions forwarded to peers after local validation.
///
/// Broadcast by the node that accepted the transactions; the `sender` is the
/// relay source recorded against each pending-pool entry.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ForwardedTransactions {
    /// Relay source.
    pub sender: ValidatorId,
    /// The forwarded batch.
    pub transactions: Vec<SignedTransaction>,
}

impl NetworkMessage for ForwardedTransactions {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::TransactionRelay
    }

    fn priority() -> MessagePriority {
        MessagePriority::Propagation
    }
}

/// Leader's proposal of the next block pair.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockProposal {
    /// The proposing leader.
    pub proposer: ValidatorId,
    /// The candidate block pair.
    pub block: BlockPair,
}

impl NetworkMessage for BlockProposal {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::ConsensusProposal
    }

    fn priority() -> MessagePriority {
        MessagePriority::Critical
    }
}

/// A validator's vote on a proposed block pair. Unicast to the leader.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockVote {
    /// The voting validator.
    pub voter: ValidatorId,
    /// Height of the block voted on.
    pub height: BlockHeight,
    /// Hash of the block pair voted on (its transactions block hash).
    pub block_hash: Hash,
    /// Ed25519 signature over the vote message.
    pub signature: Signature,
}

impl BlockVote {
    /// The canonical byte string a vote signature covers.
    pub fn signing_message(height: BlockHeight, block_hash: &Hash) -> Vec<u8> {
        let mut message = Vec::with_capacity(8 + 8 + Hash::BYTES);
        message.extend_from_slice(b"ORB-VOTE");
        message.extend_from_slice(&height.0.to_le_bytes());
        message.extend_from_slice(block_hash.as_bytes());
        message
    }
}

impl NetworkMessage for BlockVote {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::ConsensusVote
    }

    fn priority() -> MessagePriority {
        MessagePriority::Critical
    }
}

/// Leader's commit announcement: the block pair plus the quorum of votes
/// that justified committing it.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockCommit {
    /// The committed block pair.
    pub block: BlockPair,
    /// Vote evidence; must reach the federation quorum threshold.
    pub votes: Vec<BlockVote>,
}

impl NetworkMessage for BlockCommit {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::ConsensusCommit
    }

    fn priority() -> MessagePriority {
        MessagePriority::Critical
    }
}
