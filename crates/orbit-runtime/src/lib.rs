//! Tokio runtime for the Orbit node.
//!
//! Everything I/O-shaped lives here, around the deterministic
//! [`orbit_node::NodeStateMachine`]:
//!
//! - [`supervisor`]: the only sanctioned way to spawn a long-running task -
//!   panics are caught, logged, and (optionally) the task restarts until
//!   shutdown
//! - [`NodeLoop`]: a dedicated thread driving the state machine from
//!   crossbeam channels and executing its actions
//! - [`TimerManager`]: `Action::SetTimer` → tokio sleeps
//! - [`BlockTracker`]: bounded wait-for-height used by the service surface
//! - [`TransactionWaiter`]: per-transaction commit notifications backing
//!   the blocking send-transaction path
//! - [`rpc`]: the axum HTTP adapter for the three client endpoints

mod node_loop;
mod outbound;
pub mod rpc;
pub mod supervisor;
mod timers;
mod tracker;
mod waiter;

pub use node_loop::{LoopHandle, LoopInput, NodeLoop};
pub use supervisor::{
    shutdown_channel, spawn_one_off, spawn_supervised, ShutdownHandle, ShutdownSignal,
};
pub use timers::TimerManager;
pub use tracker::{BlockTracker, BlockTrackerHandle, TrackerConfig, TrackerError};
pub use waiter::{CommittedNotification, ResultsHandler, TransactionWaiter};
