//! Block sync catch-up: a lagging node pulls committed history from its
//! peers in batches and rejoins at the tip.

mod common;

use common::network;
use orbit_test_helpers::{test_keypair, transfer_transaction};
use orbit_types::{derive_address, BlockHeight};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(300);

#[test]
fn lagging_node_catches_up_in_batches() {
    let mut net = network(4);
    let sender = test_keypair(30);
    let to = derive_address(&test_keypair(31).public);

    // Node 3 misses everything from here on.
    net.set_offline(3, true);

    // The remaining quorum (3 of 4) commits 20 blocks.
    for round in 0..20u64 {
        let tx = transfer_transaction(&sender, round + 1, to, net.timestamp());
        net.submit_transaction(0, tx).unwrap();
        let committed = net.run_until(DEADLINE, |net| {
            (0..3).all(|i| net.committed_height(i) >= BlockHeight(round + 1))
        });
        assert!(committed, "quorum failed to commit block {}", round + 1);
    }
    assert_eq!(net.committed_height(3), BlockHeight(0));

    // Back online: the sync driver pulls the history in batches of 10
    // (default), two rounds to reach the tip.
    net.set_offline(3, false);
    let caught_up = net.run_until(DEADLINE, |net| {
        net.committed_height(3) >= BlockHeight(20)
    });
    assert!(caught_up, "lagging node never caught up");
    assert_eq!(net.committed_height(3), BlockHeight(20));

    // The synced chain is bit-exact with the source's.
    for height in 1..=20u64 {
        assert_eq!(
            net.block_at(3, BlockHeight(height)).unwrap(),
            net.block_at(0, BlockHeight(height)).unwrap(),
            "divergence at height {height}"
        );
    }

    // Receipts were committed in strictly ascending height order, no gaps.
    let heights: Vec<u64> = net
        .committed_receipts(3)
        .iter()
        .map(|(h, _)| h.0)
        .collect();
    assert_eq!(heights, (1..=20u64).collect::<Vec<_>>());
}

#[test]
fn sync_driver_stays_idle_when_chain_advances() {
    let mut net = network(4);
    let sender = test_keypair(32);
    let to = derive_address(&test_keypair(33).public);

    let tx = transfer_transaction(&sender, 1, to, net.timestamp());
    net.submit_transaction(0, tx).unwrap();
    assert!(net.run_until_height(BlockHeight(1), DEADLINE));

    // A settled network exchanges availability requests but nobody can
    // serve a node that is already at the shared tip; heights stay equal.
    net.run_until(net.now() + Duration::from_secs(12), |_| false);
    for i in 0..net.len() {
        assert_eq!(net.committed_height(i), BlockHeight(1));
    }
}
