//! Deterministic multi-node simulation for Orbit.
//!
//! Runs N complete [`orbit_node::NodeStateMachine`]s against a virtual
//! clock and a seeded event queue with uniform delivery latency. Every run
//! with the same inputs takes the same path; the acceptance tests under
//! `tests/` drive whole-network scenarios without timing flakes.

mod event_queue;
mod runner;

pub use event_queue::EventKey;
pub use runner::{SimConfig, SimNetwork};
