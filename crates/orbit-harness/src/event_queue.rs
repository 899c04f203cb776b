//! Event queue key with deterministic ordering.

use orbit_core::EventPriority;
use std::cmp::Ordering;
use std::time::Duration;

/// Key for ordering events in the simulation queue.
///
/// Events are ordered by:
/// 1. Time (earlier first)
/// 2. Priority (internal before timer before network before client)
/// 3. Node index (deterministic ordering)
/// 4. Sequence number (FIFO for same time/priority/node)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EventKey {
    /// When this event should be processed.
    pub time: Duration,
    /// Priority for ordering at the same time.
    pub priority: EventPriority,
    /// Which node receives this event.
    pub node_index: u32,
    /// Sequence number for deterministic FIFO ordering.
    pub sequence: u64,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.time.cmp(&other.time) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.node_index.cmp(&other.node_index) {
            Ordering::Equal => {}
            ord => return ord,
        }
        self.sequence.cmp(&other.sequence)
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_orders_first() {
        let earlier = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Network,
            node_index: 5,
            sequence: 10,
        };
        let later = EventKey {
            time: Duration::from_secs(2),
            priority: EventPriority::Internal,
            node_index: 0,
            sequence: 1,
        };
        assert!(earlier < later);
    }

    #[test]
    fn test_priority_orders_at_same_time() {
        let internal = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Internal,
            node_index: 0,
            sequence: 2,
        };
        let network = EventKey {
            time: Duration::from_secs(1),
            priority: EventPriority::Network,
            node_index: 0,
            sequence: 1,
        };
        assert!(internal < network);
    }
}
