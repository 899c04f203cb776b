//! Timer identification for scheduled events.
//!
//! The state machine emits `Action::SetTimer`; runners convert that into
//! their own mechanism (tokio sleeps in the runtime, queue insertion in the
//! deterministic harness).

/// Timer identification for scheduled events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Leader block proposal attempt.
    Proposal,
    /// Pending pool expiry sweep.
    PendingSweep,
    /// Committed pool expiry sweep.
    CommittedSweep,
    /// Block sync round driver.
    SyncRound,
}

impl TimerId {
    /// The event delivered when this timer fires.
    pub fn into_event(self) -> crate::Event {
        match self {
            TimerId::Proposal => crate::Event::ProposalTimer,
            TimerId::PendingSweep => crate::Event::PendingSweepTimer,
            TimerId::CommittedSweep => crate::Event::CommittedSweepTimer,
            TimerId::SyncRound => crate::Event::SyncRoundTimer,
        }
    }
}
