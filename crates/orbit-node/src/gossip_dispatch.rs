//! Gossip message dispatch: topic → typed message → [`Event`] conversion.
//!
//! Used two ways:
//!
//! - **Runtime**: [`register_gossip_handlers`] registers typed handlers on
//!   the transport during setup; handlers construct events and push them
//!   into the node loop's channel.
//! - **Harness**: [`decode_gossip_to_event`] decodes wire bytes directly
//!   into events so the harness can apply latency before scheduling
//!   delivery.

use orbit_core::Event;
use orbit_messages::{
    BlockAvailabilityRequest, BlockAvailabilityResponse, BlockCommit, BlockProposal,
    BlockSyncRequest, BlockSyncResponse, BlockVote, ForwardedTransactions,
};
use orbit_network::{decode_envelope, CodecError, Transport};
use orbit_types::{GossipTopic, ValidatorId};

/// Register all gossip message handlers for `node` on a transport.
///
/// Each handler decodes the typed message, converts it to an [`Event`],
/// and sends it through the provided channel. Called during setup before
/// the event loop starts.
pub fn register_gossip_handlers<T: Transport>(
    transport: &T,
    node: ValidatorId,
    event_tx: crossbeam::channel::Sender<Event>,
) {
    let tx = event_tx.clone();
    transport.on_message::<ForwardedTransactions>(
        node,
        Box::new(move |_sender, message| {
            let _ = tx.send(Event::TransactionsForwarded { message });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockProposal>(
        node,
        Box::new(move |_sender, proposal| {
            let _ = tx.send(Event::BlockProposalReceived {
                proposal: Box::new(proposal),
            });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockVote>(
        node,
        Box::new(move |_sender, vote| {
            let _ = tx.send(Event::BlockVoteReceived { vote });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockCommit>(
        node,
        Box::new(move |_sender, commit| {
            let _ = tx.send(Event::BlockCommitReceived {
                commit: Box::new(commit),
            });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockAvailabilityRequest>(
        node,
        Box::new(move |_sender, request| {
            let _ = tx.send(Event::BlockAvailabilityRequestReceived { request });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockAvailabilityResponse>(
        node,
        Box::new(move |_sender, response| {
            let _ = tx.send(Event::BlockAvailabilityResponseReceived { response });
        }),
    );

    let tx = event_tx.clone();
    transport.on_message::<BlockSyncRequest>(
        node,
        Box::new(move |_sender, request| {
            let _ = tx.send(Event::BlockSyncRequestReceived { request });
        }),
    );

    let tx = event_tx;
    transport.on_message::<BlockSyncResponse>(
        node,
        Box::new(move |_sender, response| {
            let _ = tx.send(Event::BlockSyncResponseReceived {
                response: Box::new(response),
            });
        }),
    );
}

/// Decode a wire envelope into the event a node would receive.
///
/// The envelope's topic selects the message type; the body is its plain
/// canonical encoding.
pub fn decode_gossip_to_event(wire: &[u8]) -> Result<Event, CodecError> {
    let (topic, body) = decode_envelope(wire)?;
    let decode_body = |e| CodecError::Decode(e);

    Ok(match topic {
        GossipTopic::TransactionRelay => Event::TransactionsForwarded {
            message: sbor::basic_decode(&body).map_err(decode_body)?,
        },
        GossipTopic::ConsensusProposal => Event::BlockProposalReceived {
            proposal: Box::new(sbor::basic_decode(&body).map_err(decode_body)?),
        },
        GossipTopic::ConsensusVote => Event::BlockVoteReceived {
            vote: sbor::basic_decode(&body).map_err(decode_body)?,
        },
        GossipTopic::ConsensusCommit => Event::BlockCommitReceived {
            commit: Box::new(sbor::basic_decode(&body).map_err(decode_body)?),
        },
        GossipTopic::SyncAvailabilityRequest => Event::BlockAvailabilityRequestReceived {
            request: sbor::basic_decode(&body).map_err(decode_body)?,
        },
        GossipTopic::SyncAvailabilityResponse => Event::BlockAvailabilityResponseReceived {
            response: sbor::basic_decode(&body).map_err(decode_body)?,
        },
        GossipTopic::SyncChunkRequest => Event::BlockSyncRequestReceived {
            request: sbor::basic_decode(&body).map_err(decode_body)?,
        },
        GossipTopic::SyncChunkResponse => Event::BlockSyncResponseReceived {
            response: Box::new(sbor::basic_decode(&body).map_err(decode_body)?),
        },
    })
}
