//! Gossip topics, network message traits, and priority classification.

use sbor::prelude::{BasicDecode, BasicEncode, BasicSbor};

/// The gossip topics of the protocol, one per wire message type.
///
/// The table is closed: every [`NetworkMessage`] names one of these ids,
/// and transport dispatch is keyed by the variant rather than by raw
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GossipTopic {
    /// Relay of locally accepted transactions.
    TransactionRelay,
    /// Leader block proposal.
    ConsensusProposal,
    /// Validator vote on a proposal.
    ConsensusVote,
    /// Leader commit announcement with vote evidence.
    ConsensusCommit,
    /// Sync: petitioner availability broadcast.
    SyncAvailabilityRequest,
    /// Sync: source availability reply.
    SyncAvailabilityResponse,
    /// Sync: petitioner chunk request.
    SyncChunkRequest,
    /// Sync: source chunk reply.
    SyncChunkResponse,
}

impl GossipTopic {
    /// Every topic, in protocol order.
    pub const ALL: [GossipTopic; 8] = [
        GossipTopic::TransactionRelay,
        GossipTopic::ConsensusProposal,
        GossipTopic::ConsensusVote,
        GossipTopic::ConsensusCommit,
        GossipTopic::SyncAvailabilityRequest,
        GossipTopic::SyncAvailabilityResponse,
        GossipTopic::SyncChunkRequest,
        GossipTopic::SyncChunkResponse,
    ];

    /// The wire identifier of this topic.
    pub fn type_id(self) -> &'static str {
        match self {
            GossipTopic::TransactionRelay => "transaction.relay",
            GossipTopic::ConsensusProposal => "consensus.proposal",
            GossipTopic::ConsensusVote => "consensus.vote",
            GossipTopic::ConsensusCommit => "consensus.commit",
            GossipTopic::SyncAvailabilityRequest => "sync.availability.request",
            GossipTopic::SyncAvailabilityResponse => "sync.availability.response",
            GossipTopic::SyncChunkRequest => "sync.chunk.request",
            GossipTopic::SyncChunkResponse => "sync.chunk.response",
        }
    }

    /// Resolve a wire identifier back to its topic.
    pub fn from_type_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|topic| topic.type_id() == id)
    }

    /// Dense index of this topic, for slot tables.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Network message priority levels.
///
/// Lower numeric values = higher priority. Messages at the same priority are
/// processed FIFO. Priority determines processing order in the transport
/// delivery path and shedding behavior under load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BasicSbor)]
#[repr(u8)]
pub enum MessagePriority {
    /// Liveness-critical consensus messages (proposals, votes, commits).
    /// Never dropped, processed immediately.
    Critical = 0,

    /// Mempool propagation (transaction relay).
    /// Best-effort, can be shed under load.
    Propagation = 1,

    /// Block sync catch-up traffic. Lowest priority, fully deferrable.
    Background = 2,
}

impl MessagePriority {
    /// Whether this priority level can be dropped under backpressure.
    #[inline]
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            MessagePriority::Propagation | MessagePriority::Background
        )
    }
}

/// Marker trait for gossip messages.
///
/// All messages sent over the transport implement this trait. Each message
/// type names the [`GossipTopic`] it travels on, and a priority for
/// transport QoS.
pub trait NetworkMessage: Send + Sync + Sized + BasicEncode + BasicDecode {
    /// The topic this message travels on.
    fn gossip_topic() -> GossipTopic
    where
        Self: Sized;

    /// Wire identifier of the message's topic.
    fn message_type_id() -> &'static str
    where
        Self: Sized,
    {
        Self::gossip_topic().type_id()
    }

    /// The priority level for this message type.
    ///
    /// Defaults to `Background` - override for higher priority messages.
    fn priority() -> MessagePriority
    where
        Self: Sized,
    {
        MessagePriority::Background
    }

}
