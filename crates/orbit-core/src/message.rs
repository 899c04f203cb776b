//! Outbound message types for network communication.

use crate::Event;
use orbit_messages::{
    BlockAvailabilityRequest, BlockAvailabilityResponse, BlockCommit, BlockProposal,
    BlockSyncRequest, BlockSyncResponse, BlockVote, ForwardedTransactions,
};
use orbit_types::{MessagePriority, NetworkMessage};

/// Outbound network messages.
///
/// These are the messages a node can send to other nodes. The runner handles
/// the actual network I/O; `Action::Broadcast` and `Action::Unicast` carry
/// one of these.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Relay of locally accepted transactions.
    ForwardedTransactions(ForwardedTransactions),

    /// Leader block proposal.
    /// Boxed to reduce enum size variance (carries a full block pair).
    BlockProposal(Box<BlockProposal>),

    /// Validator vote on a proposal.
    BlockVote(BlockVote),

    /// Leader commit announcement with vote evidence.
    BlockCommit(Box<BlockCommit>),

    /// Sync: petitioner availability broadcast.
    BlockAvailabilityRequest(BlockAvailabilityRequest),

    /// Sync: source availability reply.
    BlockAvailabilityResponse(BlockAvailabilityResponse),

    /// Sync: petitioner chunk request.
    BlockSyncRequest(BlockSyncRequest),

    /// Sync: source chunk reply.
    BlockSyncResponse(Box<BlockSyncResponse>),
}

impl OutboundMessage {
    /// Get a human-readable name for this message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::ForwardedTransactions(_) => "ForwardedTransactions",
            OutboundMessage::BlockProposal(_) => "BlockProposal",
            OutboundMessage::BlockVote(_) => "BlockVote",
            OutboundMessage::BlockCommit(_) => "BlockCommit",
            OutboundMessage::BlockAvailabilityRequest(_) => "BlockAvailabilityRequest",
            OutboundMessage::BlockAvailabilityResponse(_) => "BlockAvailabilityResponse",
            OutboundMessage::BlockSyncRequest(_) => "BlockSyncRequest",
            OutboundMessage::BlockSyncResponse(_) => "BlockSyncResponse",
        }
    }

    /// The wire type id used for routing.
    pub fn type_id(&self) -> &'static str {
        match self {
            OutboundMessage::ForwardedTransactions(_) => ForwardedTransactions::message_type_id(),
            OutboundMessage::BlockProposal(_) => BlockProposal::message_type_id(),
            OutboundMessage::BlockVote(_) => BlockVote::message_type_id(),
            OutboundMessage::BlockCommit(_) => BlockCommit::message_type_id(),
            OutboundMessage::BlockAvailabilityRequest(_) => {
                BlockAvailabilityRequest::message_type_id()
            }
            OutboundMessage::BlockAvailabilityResponse(_) => {
                BlockAvailabilityResponse::message_type_id()
            }
            OutboundMessage::BlockSyncRequest(_) => BlockSyncRequest::message_type_id(),
            OutboundMessage::BlockSyncResponse(_) => BlockSyncResponse::message_type_id(),
        }
    }

    /// Get the network priority for this message.
    ///
    /// Priority is determined by the underlying message type's implementation
    /// of [`NetworkMessage::priority()`].
    pub fn priority(&self) -> MessagePriority {
        match self {
            OutboundMessage::ForwardedTransactions(_) => ForwardedTransactions::priority(),
            OutboundMessage::BlockProposal(_) => BlockProposal::priority(),
            OutboundMessage::BlockVote(_) => BlockVote::priority(),
            OutboundMessage::BlockCommit(_) => BlockCommit::priority(),
            OutboundMessage::BlockAvailabilityRequest(_) => BlockAvailabilityRequest::priority(),
            OutboundMessage::BlockAvailabilityResponse(_) => BlockAvailabilityResponse::priority(),
            OutboundMessage::BlockSyncRequest(_) => BlockSyncRequest::priority(),
            OutboundMessage::BlockSyncResponse(_) => BlockSyncResponse::priority(),
        }
    }

    /// Convert an outbound message into the event a receiving node sees.
    ///
    /// Used by the in-process transports to deliver messages uniformly.
    pub fn into_received_event(self) -> Event {
        match self {
            OutboundMessage::ForwardedTransactions(message) => {
                Event::TransactionsForwarded { message }
            }
            OutboundMessage::BlockProposal(proposal) => Event::BlockProposalReceived { proposal },
            OutboundMessage::BlockVote(vote) => Event::BlockVoteReceived { vote },
            OutboundMessage::BlockCommit(commit) => Event::BlockCommitReceived { commit },
            OutboundMessage::BlockAvailabilityRequest(request) => {
                Event::BlockAvailabilityRequestReceived { request }
            }
            OutboundMessage::BlockAvailabilityResponse(response) => {
                Event::BlockAvailabilityResponseReceived { response }
            }
            OutboundMessage::BlockSyncRequest(request) => {
                Event::BlockSyncRequestReceived { request }
            }
            OutboundMessage::BlockSyncResponse(response) => {
                Event::BlockSyncResponseReceived { response }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::{BlockHeight, ValidatorId};

    #[test]
    fn test_delivery_preserves_message() {
        let msg = OutboundMessage::BlockSyncRequest(BlockSyncRequest {
            sender: ValidatorId(1),
            first_height: BlockHeight(5),
            last_height: BlockHeight(14),
        });
        match msg.into_received_event() {
            Event::BlockSyncRequestReceived { request } => {
                assert_eq!(request.first_height, BlockHeight(5));
            }
            other => panic!("unexpected event: {}", other.type_name()),
        }
    }

    #[test]
    fn test_consensus_messages_are_critical() {
        let vote = OutboundMessage::BlockVote(BlockVote {
            voter: ValidatorId(1),
            height: BlockHeight(1),
            block_hash: orbit_types::Hash::ZERO,
            signature: orbit_types::Signature::zero(),
        });
        assert_eq!(vote.priority(), MessagePriority::Critical);
    }
}
