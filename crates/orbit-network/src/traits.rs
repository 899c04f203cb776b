//! Transport trait for typed message passing.
//!
//! Implemented by the in-memory transport (tests, harness, single-node dev
//! runs). A real wire backend would implement the same contract.

use orbit_types::{NetworkMessage, ValidatorId};

/// Transport interface for sending typed messages and registering listeners.
///
/// Generic methods make this NOT object-safe - use `T: Transport` bounds.
///
/// All sends are fire-and-forget: transport failures are logged by the
/// implementation and dropped, never surfaced to the protocol (the
/// surrounding state machines recover via timeouts and retries). Listeners
/// are called from the transport's delivery context - handlers should be
/// lightweight (push into a channel, not do heavy processing).
pub trait Transport: Send + Sync {
    /// Broadcast a message to all federation peers (not the sender itself).
    fn broadcast<M: NetworkMessage>(&self, sender: ValidatorId, message: &M);

    /// Send a message to one specific peer.
    fn send_to<M: NetworkMessage>(&self, sender: ValidatorId, peer: ValidatorId, message: &M);

    /// Register a typed listener for a message type, on behalf of `node`.
    ///
    /// When a message of type M arrives for `node`, the handler is called
    /// with the sender's identity and the decoded message.
    ///
    /// Implementations store handlers type-erased, keyed by
    /// `M::message_type_id()`.
    fn on_message<M: NetworkMessage + 'static>(
        &self,
        node: ValidatorId,
        handler: Box<dyn Fn(ValidatorId, M) + Send + Sync>,
    );
}
