//! Node composition for Orbit.
//!
//! [`NodeStateMachine`] wires the transaction pool, the consensus
//! algorithm, the block sync driver, and the execution engine into one
//! deterministic state machine. Runners (the tokio runtime, the
//! deterministic harness) drive it with events and execute its actions.

mod config;
mod gossip_dispatch;
mod state;
mod sync;

pub use config::NodeConfig;
pub use gossip_dispatch::{decode_gossip_to_event, register_gossip_handlers};
pub use state::NodeStateMachine;
pub use sync::{BlockSyncState, SyncConfig, SyncPhase};
