//! Outbound message fan-out onto the transport.

use orbit_core::OutboundMessage;
use orbit_network::Transport;
use orbit_types::ValidatorId;

/// Send an outbound message through the transport.
///
/// `peer` selects unicast; `None` broadcasts. Transport failures are the
/// implementation's to log - sends are fire-and-forget here.
pub fn send_outbound<T: Transport>(
    transport: &T,
    local_id: ValidatorId,
    peer: Option<ValidatorId>,
    message: OutboundMessage,
) {
    match (peer, message) {
        (None, OutboundMessage::ForwardedTransactions(m)) => transport.broadcast(local_id, &m),
        (None, OutboundMessage::BlockProposal(m)) => transport.broadcast(local_id, &*m),
        (None, OutboundMessage::BlockVote(m)) => transport.broadcast(local_id, &m),
        (None, OutboundMessage::BlockCommit(m)) => transport.broadcast(local_id, &*m),
        (None, OutboundMessage::BlockAvailabilityRequest(m)) => transport.broadcast(local_id, &m),
        (None, OutboundMessage::BlockAvailabilityResponse(m)) => transport.broadcast(local_id, &m),
        (None, OutboundMessage::BlockSyncRequest(m)) => transport.broadcast(local_id, &m),
        (None, OutboundMessage::BlockSyncResponse(m)) => transport.broadcast(local_id, &*m),

        (Some(peer), OutboundMessage::ForwardedTransactions(m)) => {
            transport.send_to(local_id, peer, &m)
        }
        (Some(peer), OutboundMessage::BlockProposal(m)) => transport.send_to(local_id, peer, &*m),
        (Some(peer), OutboundMessage::BlockVote(m)) => transport.send_to(local_id, peer, &m),
        (Some(peer), OutboundMessage::BlockCommit(m)) => transport.send_to(local_id, peer, &*m),
        (Some(peer), OutboundMessage::BlockAvailabilityRequest(m)) => {
            transport.send_to(local_id, peer, &m)
        }
        (Some(peer), OutboundMessage::BlockAvailabilityResponse(m)) => {
            transport.send_to(local_id, peer, &m)
        }
        (Some(peer), OutboundMessage::BlockSyncRequest(m)) => {
            transport.send_to(local_id, peer, &m)
        }
        (Some(peer), OutboundMessage::BlockSyncResponse(m)) => {
            transport.send_to(local_id, peer, &*m)
        }
    }
}
