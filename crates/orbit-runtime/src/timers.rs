//! Timer manager: `Action::SetTimer` → tokio sleeps.

use crossbeam::channel::Sender;
use orbit_core::{Event, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Converts timer actions into tokio sleep tasks that fire events back
/// into the node loop's timer channel.
///
/// Setting an already-armed timer id replaces it (the pending sleep is
/// aborted).
pub struct TimerManager {
    tokio_handle: tokio::runtime::Handle,
    timer_tx: Sender<Event>,
    active: HashMap<TimerId, JoinHandle<()>>,
}

impl TimerManager {
    /// Create a manager feeding `timer_tx`.
    pub fn new(tokio_handle: tokio::runtime::Handle, timer_tx: Sender<Event>) -> Self {
        Self {
            tokio_handle,
            timer_tx,
            active: HashMap::new(),
        }
    }

    /// Arm (or re-arm) a timer.
    pub fn set_timer(&mut self, id: TimerId, duration: Duration) {
        if let Some(previous) = self.active.remove(&id) {
            previous.abort();
        }
        let timer_tx = self.timer_tx.clone();
        let handle = self.tokio_handle.spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = timer_tx.send(id.into_event());
        });
        self.active.insert(id, handle);
    }

    /// Cancel a pending timer.
    pub fn cancel_timer(&mut self, id: TimerId) {
        if let Some(handle) = self.active.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timer_fires_event() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut timers = TimerManager::new(tokio::runtime::Handle::current(), tx);

        timers.set_timer(TimerId::Proposal, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(rx.try_recv(), Ok(Event::ProposalTimer)));
    }

    #[tokio::test]
    async fn test_rearm_replaces_pending_timer() {
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut timers = TimerManager::new(tokio::runtime::Handle::current(), tx);

        timers.set_timer(TimerId::SyncRound, Duration::from_secs(60));
        timers.set_timer(TimerId::SyncRound, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Exactly one firing: the rearmed one.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
