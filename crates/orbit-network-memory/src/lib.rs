//! In-process transport for the Orbit node.
//!
//! [`MemoryTransport`] connects the nodes of one process (tests, the
//! deterministic harness, single-node dev runs) through per-node
//! [`HandlerRegistry`] instances. Messages go through the full wire codec
//! (SBOR + LZ4 + type-id framing) so the delivery path matches what a real
//! wire backend would exercise.

mod transport;

pub use transport::MemoryTransport;
