//! Shared harness setup for the acceptance tests.

use orbit_harness::{SimConfig, SimNetwork};
use orbit_node::NodeConfig;
use orbit_test_helpers::{federation_with_keys, TEST_CHAIN};
use orbit_types::ValidatorId;

/// A network of `size` nodes with default settings. Node 0 is the leader.
pub fn network(size: u8) -> SimNetwork {
    let (federation, keys) = federation_with_keys(size);
    let setups = keys
        .into_iter()
        .enumerate()
        .map(|(i, k)| {
            (
                NodeConfig::new(ValidatorId(i as u32), TEST_CHAIN, federation.clone()),
                k.private,
            )
        })
        .collect();
    SimNetwork::new(setups, SimConfig::default())
}
