//! Protocol events for the deterministic state machine.

use orbit_messages::{
    BlockAvailabilityRequest, BlockAvailabilityResponse, BlockCommit, BlockProposal,
    BlockSyncRequest, BlockSyncResponse, BlockVote, ForwardedTransactions,
};
use orbit_types::BlockPair;

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same logical time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    /// Processed first to maintain causality.
    Internal = 0,

    /// Timer events: scheduled by the node itself.
    Timer = 1,

    /// Network events: external inputs from other nodes.
    Network = 2,

    /// Client events: external inputs from users.
    Client = 3,
}

/// All possible protocol events a node can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions. Client-facing
/// request/response operations (submit, receipt lookup, read-only calls)
/// are direct methods on the node state machine instead; runners own the
/// channels that deliver them.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════
    /// Time for the leader to attempt a block proposal.
    ProposalTimer,

    /// Pending pool expiry sweep tick.
    PendingSweepTimer,

    /// Committed pool expiry sweep tick.
    CommittedSweepTimer,

    /// Block sync driver tick: starts a round, or expires the current
    /// collection/chunk-wait phase.
    SyncRoundTimer,

    // ═══════════════════════════════════════════════════════════════════
    // Network Messages (priority: Network)
    // ═══════════════════════════════════════════════════════════════════
    /// A peer forwarded a batch of transactions.
    TransactionsForwarded { message: ForwardedTransactions },

    /// The leader proposed a block pair.
    BlockProposalReceived { proposal: Box<BlockProposal> },

    /// A validator voted on a proposed block pair.
    BlockVoteReceived { vote: BlockVote },

    /// The leader announced a committed block pair with vote evidence.
    BlockCommitReceived { commit: Box<BlockCommit> },

    /// A lagging peer asked who can serve it blocks.
    BlockAvailabilityRequestReceived { request: BlockAvailabilityRequest },

    /// A source advertised the range it can serve us.
    BlockAvailabilityResponseReceived { response: BlockAvailabilityResponse },

    /// A petitioner asked us for a chunk of blocks.
    BlockSyncRequestReceived { request: BlockSyncRequest },

    /// A source sent us a chunk of blocks.
    BlockSyncResponseReceived { response: Box<BlockSyncResponse> },

    // ═══════════════════════════════════════════════════════════════════
    // Internal Events (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════
    /// A block pair was committed locally. Fanned out to the pool, the
    /// sync driver, and the proposal buffer.
    BlockCommitted { block: Box<BlockPair> },
}

impl Event {
    /// Get the priority for this event type.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::BlockCommitted { .. } => EventPriority::Internal,

            Event::ProposalTimer
            | Event::PendingSweepTimer
            | Event::CommittedSweepTimer
            | Event::SyncRoundTimer => EventPriority::Timer,

            Event::TransactionsForwarded { .. }
            | Event::BlockProposalReceived { .. }
            | Event::BlockVoteReceived { .. }
            | Event::BlockCommitReceived { .. }
            | Event::BlockAvailabilityRequestReceived { .. }
            | Event::BlockAvailabilityResponseReceived { .. }
            | Event::BlockSyncRequestReceived { .. }
            | Event::BlockSyncResponseReceived { .. } => EventPriority::Network,
        }
    }

    /// Check if this is an internal event (consequence of prior processing).
    pub fn is_internal(&self) -> bool {
        self.priority() == EventPriority::Internal
    }

    /// Check if this is a network event (from another node).
    pub fn is_network(&self) -> bool {
        self.priority() == EventPriority::Network
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::ProposalTimer => "ProposalTimer",
            Event::PendingSweepTimer => "PendingSweepTimer",
            Event::CommittedSweepTimer => "CommittedSweepTimer",
            Event::SyncRoundTimer => "SyncRoundTimer",
            Event::TransactionsForwarded { .. } => "TransactionsForwarded",
            Event::BlockProposalReceived { .. } => "BlockProposalReceived",
            Event::BlockVoteReceived { .. } => "BlockVoteReceived",
            Event::BlockCommitReceived { .. } => "BlockCommitReceived",
            Event::BlockAvailabilityRequestReceived { .. } => "BlockAvailabilityRequestReceived",
            Event::BlockAvailabilityResponseReceived { .. } => "BlockAvailabilityResponseReceived",
            Event::BlockSyncRequestReceived { .. } => "BlockSyncRequestReceived",
            Event::BlockSyncResponseReceived { .. } => "BlockSyncResponseReceived",
            Event::BlockCommitted { .. } => "BlockCommitted",
        }
    }
}
