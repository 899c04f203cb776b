//! Actions emitted by the state machine for the runner to execute.

use crate::{Event, OutboundMessage, TimerId};
use orbit_types::{BlockHeight, TimestampNano, TransactionReceipt, ValidatorId};
use std::time::Duration;

/// All possible outputs from the state machine.
///
/// Actions describe I/O the runner must perform. They are the only way the
/// state machine reaches the outside world.
#[derive(Debug)]
pub enum Action {
    /// Broadcast a message to every federation peer.
    Broadcast {
        /// The message to send.
        message: OutboundMessage,
    },

    /// Send a message to one specific peer.
    Unicast {
        /// The recipient.
        peer: ValidatorId,
        /// The message to send.
        message: OutboundMessage,
    },

    /// Schedule (or reschedule) a timer. Setting an already-armed timer id
    /// replaces it.
    SetTimer {
        /// Timer identity.
        id: TimerId,
        /// Delay until it fires.
        duration: Duration,
    },

    /// Feed an internal event back into the state machine ahead of external
    /// inputs.
    EnqueueInternal {
        /// The event to process next.
        event: Event,
    },

    /// Deliver newly committed receipts to registered transaction-results
    /// handlers (and release any waiters on these transactions).
    NotifyTransactionResults {
        /// Receipts committed in this block.
        receipts: Vec<TransactionReceipt>,
        /// Height they committed at.
        block_height: BlockHeight,
        /// Timestamp they committed at.
        block_timestamp: TimestampNano,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Broadcast { .. } => "Broadcast",
            Action::Unicast { .. } => "Unicast",
            Action::SetTimer { .. } => "SetTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::NotifyTransactionResults { .. } => "NotifyTransactionResults",
        }
    }
}
