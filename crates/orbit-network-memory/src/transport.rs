//! The in-memory transport hub.

use orbit_network::{decode_envelope, encode_to_wire, HandlerRegistry, Transport};
use orbit_types::{NetworkMessage, ValidatorId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// In-process transport connecting the nodes of one process.
///
/// Delivery is synchronous on the sender's thread. Handlers must be
/// lightweight (push into a channel); the runners own any queuing.
pub struct MemoryTransport {
    registries: RwLock<HashMap<ValidatorId, HandlerRegistry>>,
}

impl MemoryTransport {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            registries: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a node to the hub. Idempotent.
    pub fn join(&self, node: ValidatorId) {
        self.registries.write().entry(node).or_default();
    }

    /// Nodes currently attached.
    pub fn peers(&self) -> Vec<ValidatorId> {
        let mut peers: Vec<_> = self.registries.read().keys().copied().collect();
        peers.sort();
        peers
    }

    fn deliver(&self, sender: ValidatorId, recipient: ValidatorId, wire: &[u8]) {
        let registries = self.registries.read();
        let Some(registry) = registries.get(&recipient) else {
            warn!(%recipient, "dropping message for unknown peer");
            return;
        };
        match decode_envelope(wire) {
            Ok((topic, body)) => {
                if !registry.deliver(sender, topic, &body) {
                    warn!(%recipient, ?topic, "no handler subscribed for topic");
                }
            }
            Err(e) => warn!(%recipient, error = %e, "dropping corrupt wire envelope"),
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn broadcast<M: NetworkMessage>(&self, sender: ValidatorId, message: &M) {
        let wire = match encode_to_wire(message) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "failed to encode broadcast");
                return;
            }
        };
        for peer in self.peers() {
            if peer != sender {
                self.deliver(sender, peer, &wire);
            }
        }
    }

    fn send_to<M: NetworkMessage>(&self, sender: ValidatorId, peer: ValidatorId, message: &M) {
        let wire = match encode_to_wire(message) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, "failed to encode unicast");
                return;
            }
        };
        self.deliver(sender, peer, &wire);
    }

    fn on_message<M: NetworkMessage + 'static>(
        &self,
        node: ValidatorId,
        handler: Box<dyn Fn(ValidatorId, M) + Send + Sync>,
    ) {
        let mut registries = self.registries.write();
        registries.entry(node).or_default().subscribe(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_messages::BlockAvailabilityRequest;
    use orbit_types::BlockHeight;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn request(sender: ValidatorId) -> BlockAvailabilityRequest {
        BlockAvailabilityRequest {
            sender,
            first_height: BlockHeight(1),
            last_height: BlockHeight(10),
            last_committed_height: BlockHeight(0),
        }
    }

    #[test]
    fn test_broadcast_reaches_everyone_but_sender() {
        let hub = MemoryTransport::new();
        let received: Arc<Mutex<Vec<ValidatorId>>> = Arc::new(Mutex::new(vec![]));

        for i in 0..3 {
            let node = ValidatorId(i);
            hub.join(node);
            let received = Arc::clone(&received);
            hub.on_message::<BlockAvailabilityRequest>(
                node,
                Box::new(move |_, _| received.lock().push(node)),
            );
        }

        hub.broadcast(ValidatorId(0), &request(ValidatorId(0)));

        let mut got = received.lock().clone();
        got.sort();
        assert_eq!(got, vec![ValidatorId(1), ValidatorId(2)]);
    }

    #[test]
    fn test_unicast_reaches_only_target() {
        let hub = MemoryTransport::new();
        let received: Arc<Mutex<Vec<(ValidatorId, ValidatorId)>>> = Arc::new(Mutex::new(vec![]));

        for i in 0..3 {
            let node = ValidatorId(i);
            hub.join(node);
            let received = Arc::clone(&received);
            hub.on_message::<BlockAvailabilityRequest>(
                node,
                Box::new(move |sender, _| received.lock().push((sender, node))),
            );
        }

        hub.send_to(ValidatorId(0), ValidatorId(2), &request(ValidatorId(0)));

        assert_eq!(received.lock().clone(), vec![(ValidatorId(0), ValidatorId(2))]);
    }
}
