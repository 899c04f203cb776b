//! Per-topic handler table for gossip dispatch.
//!
//! The protocol's topic table is closed ([`GossipTopic::ALL`]), so the
//! registry is a fixed slot table indexed by topic rather than a map over
//! identifier strings. A node wires exactly one route per topic at setup;
//! subscribing a topic twice replaces the earlier handler.

use orbit_types::{GossipTopic, NetworkMessage, ValidatorId};
use parking_lot::RwLock;

/// Type-erased handler: decodes the plain SBOR body and runs the typed
/// route.
type TopicHandler = Box<dyn Fn(ValidatorId, &[u8]) + Send + Sync>;

/// Fixed per-topic handler slots.
pub struct HandlerRegistry {
    slots: RwLock<Vec<Option<TopicHandler>>>,
}

impl HandlerRegistry {
    /// Create a registry with every slot empty.
    pub fn new() -> Self {
        let slots = GossipTopic::ALL.iter().map(|_| None).collect();
        Self {
            slots: RwLock::new(slots),
        }
    }

    /// Route messages of type `M` (on its topic) to `handler`.
    ///
    /// The handler receives the sender's identity and the decoded message;
    /// bodies that fail to decode are dropped. Replaces any handler the
    /// topic already had.
    pub fn subscribe<M: NetworkMessage + 'static>(
        &self,
        handler: Box<dyn Fn(ValidatorId, M) + Send + Sync>,
    ) {
        let erased: TopicHandler = Box::new(move |sender, body| {
            if let Ok(message) = sbor::basic_decode::<M>(body) {
                handler(sender, message);
            }
        });
        self.slots.write()[M::gossip_topic().index()] = Some(erased);
    }

    /// Deliver a message body to its topic's handler.
    ///
    /// Returns whether a handler was subscribed for the topic.
    pub fn deliver(&self, sender: ValidatorId, topic: GossipTopic, body: &[u8]) -> bool {
        let slots = self.slots.read();
        match &slots[topic.index()] {
            Some(handler) => {
                handler(sender, body);
                true
            }
            None => false,
        }
    }

    /// Whether the topic has a subscribed handler.
    pub fn is_subscribed(&self, topic: GossipTopic) -> bool {
        self.slots.read()[topic.index()].is_some()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_messages::BlockSyncRequest;
    use orbit_types::BlockHeight;
    use parking_lot::Mutex;
    use sbor::prelude::basic_encode;
    use std::sync::Arc;

    fn body(first: u64) -> Vec<u8> {
        basic_encode(&BlockSyncRequest {
            sender: ValidatorId(7),
            first_height: BlockHeight(first),
            last_height: BlockHeight(first + 9),
        })
        .unwrap()
    }

    #[test]
    fn test_subscribe_and_deliver() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        registry.subscribe::<BlockSyncRequest>(Box::new(move |sender, request| {
            log.lock().push((sender, request.first_height));
        }));

        assert!(registry.deliver(ValidatorId(1), GossipTopic::SyncChunkRequest, &body(5)));
        assert_eq!(seen.lock().as_slice(), &[(ValidatorId(1), BlockHeight(5))]);
    }

    #[test]
    fn test_unsubscribed_topic_reports_false() {
        let registry = HandlerRegistry::new();
        assert!(!registry.deliver(ValidatorId(1), GossipTopic::ConsensusVote, b""));
        assert!(!registry.is_subscribed(GossipTopic::ConsensusVote));
    }

    #[test]
    fn test_resubscribe_replaces_handler() {
        let registry = HandlerRegistry::new();
        let first_calls = Arc::new(Mutex::new(0usize));
        let second_calls = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&first_calls);
        registry.subscribe::<BlockSyncRequest>(Box::new(move |_, _| *counter.lock() += 1));
        let counter = Arc::clone(&second_calls);
        registry.subscribe::<BlockSyncRequest>(Box::new(move |_, _| *counter.lock() += 1));

        registry.deliver(ValidatorId(1), GossipTopic::SyncChunkRequest, &body(1));
        assert_eq!(*first_calls.lock(), 0);
        assert_eq!(*second_calls.lock(), 1);
    }

    #[test]
    fn test_corrupt_body_dropped() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(Mutex::new(0usize));

        let counter = Arc::clone(&calls);
        registry.subscribe::<BlockSyncRequest>(Box::new(move |_, _| *counter.lock() += 1));

        assert!(registry.deliver(ValidatorId(1), GossipTopic::SyncChunkRequest, b"junk"));
        assert_eq!(*calls.lock(), 0);
    }
}
