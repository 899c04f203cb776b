//! Transport abstraction for peer gossip.
//!
//! Real wire transports live outside the core; the in-process [`Transport`]
//! trait is the contract the node programs against. This crate also holds
//! the shared plumbing every implementation needs: the per-topic
//! [`HandlerRegistry`] and the SBOR envelope codec (topic identifier +
//! LZ4-compressed body).

mod codec;
mod handler_registry;
mod traits;

pub use codec::{decode_envelope, decode_from_wire, encode_to_wire, CodecError};
pub use handler_registry::HandlerRegistry;
pub use traits::Transport;
