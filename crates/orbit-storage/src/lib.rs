//! Persistence traits for the Orbit node.
//!
//! Two logical streams back a node:
//!
//! - the **block pair log**: append-only, height-indexed, written only by
//!   the consensus commit path ([`BlockPersistence`])
//! - the **state snapshot**: contract name → variable name → raw bytes,
//!   advanced by applying each results block's diffs ([`StatePersistence`])
//!
//! Durable formats are adapters outside the core; this workspace ships the
//! in-memory backend (`orbit-storage-memory`). The traits take `&self` -
//! implementations use interior mutability, with a single-writer discipline
//! on the append pointer (only consensus commits).

mod block_store;
mod state_store;

pub use block_store::{BlockPersistence, BlockStoreError};
pub use state_store::{StatePersistence, StateStoreError};
