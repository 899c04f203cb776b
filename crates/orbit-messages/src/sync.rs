//! Block sync protocol messages.
//!
//! Roles: the *petitioner* requests blocks it lacks, a *source* serves
//! blocks it has. Availability requests are broadcast; everything else is
//! unicast between the two.

use orbit_types::{BlockHeight, BlockPair, GossipTopic, NetworkMessage, ValidatorId};
use sbor::prelude::BasicSbor;

/// Petitioner broadcast: "who can serve me this range?"
///
/// The advertised range is `[last_committed + 1, last_committed + batch]`;
/// sources use `last_committed_height` to decide whether to reply at all.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockAvailabilityRequest {
    /// The petitioner.
    pub sender: ValidatorId,
    /// First height the petitioner wants.
    pub first_height: BlockHeight,
    /// Last height the petitioner wants.
    pub last_height: BlockHeight,
    /// The petitioner's current tip.
    pub last_committed_height: BlockHeight,
}

impl NetworkMessage for BlockAvailabilityRequest {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::SyncAvailabilityRequest
    }
}

/// Source reply advertising the range it can serve.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockAvailabilityResponse {
    /// The responding source.
    pub sender: ValidatorId,
    /// First height available (always 1: the log is append-only).
    pub first_available: BlockHeight,
    /// Last height available.
    pub last_available: BlockHeight,
    /// The source's tip.
    pub last_committed_height: BlockHeight,
}

impl NetworkMessage for BlockAvailabilityResponse {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::SyncAvailabilityResponse
    }
}

/// Petitioner's chunk request to a chosen source.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockSyncRequest {
    /// The petitioner.
    pub sender: ValidatorId,
    /// First height requested.
    pub first_height: BlockHeight,
    /// Last height requested. The source clamps this to its batch size.
    pub last_height: BlockHeight,
}

impl NetworkMessage for BlockSyncRequest {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::SyncChunkRequest
    }
}

/// Source reply carrying a chunk of block pairs.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockSyncResponse {
    /// The responding source.
    pub sender: ValidatorId,
    /// First height in the chunk.
    pub first_height: BlockHeight,
    /// Last height in the chunk.
    pub last_height: BlockHeight,
    /// The block pairs, in ascending height order.
    pub block_pairs: Vec<BlockPair>,
}

impl NetworkMessage for BlockSyncResponse {
    fn gossip_topic() -> GossipTopic {
        GossipTopic::SyncChunkResponse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::MessagePriority;

    #[test]
    fn test_sync_messages_are_background_priority() {
        assert_eq!(
            BlockAvailabilityRequest::priority(),
            MessagePriority::Background
        );
        assert_eq!(BlockSyncResponse::priority(), MessagePriority::Background);
        assert!(BlockSyncResponse::priority().is_droppable());
    }

    #[test]
    fn test_availability_request_roundtrip() {
        let msg = BlockAvailabilityRequest {
            sender: ValidatorId(3),
            first_height: BlockHeight(11),
            last_height: BlockHeight(20),
            last_committed_height: BlockHeight(10),
        };
        let bytes = sbor::prelude::basic_encode(&msg).unwrap();
        let decoded: BlockAvailabilityRequest = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }
}
