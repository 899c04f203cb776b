//! Transaction lifecycle across a live network: relay, rejection,
//! duplicates, and committed-receipt answers.

mod common;

use common::network;
use orbit_mempool::SubmitError;
use orbit_test_helpers::{test_keypair, transfer_transaction};
use orbit_types::{derive_address, BlockHeight, TransactionStatus, VirtualChainId};
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(60);

#[test]
fn forwards_a_new_valid_transaction_to_peers() {
    let mut net = network(3);
    let sender = test_keypair(10);
    let to = derive_address(&test_keypair(11).public);
    let tx = transfer_transaction(&sender, 5, to, net.timestamp());
    let hash = tx.hash();

    // Submitted at a validator, not the leader.
    let submission = net.submit_transaction(1, tx).unwrap();
    assert_eq!(submission.status, TransactionStatus::Pending);

    // The relay reaches every peer's pending pool (and then the leader
    // commits it, so accept either pending or committed).
    let reached_all = net.run_until(DEADLINE, |net| {
        (0..net.len()).all(|i| {
            net.transaction_status(i, &hash).status != TransactionStatus::NoRecord
        })
    });
    assert!(reached_all, "transaction never reached all peers");
}

#[test]
fn rejects_an_invalid_transaction_without_relay() {
    let mut net = network(3);
    let sender = test_keypair(10);
    let to = derive_address(&test_keypair(11).public);
    let mut tx = transfer_transaction(&sender, 5, to, net.timestamp());
    // Corrupt the body: the envelope signature no longer matches.
    tx.transaction.virtual_chain_id = VirtualChainId(7);
    let hash = tx.hash();

    let result = net.submit_transaction(1, tx);
    assert!(matches!(result, Err(SubmitError::Rejected(_))));

    // Give the network time; no peer must ever hear of it.
    net.run_until(net.now() + Duration::from_secs(2), |_| false);
    for i in 0..net.len() {
        assert_eq!(
            net.transaction_status(i, &hash).status,
            TransactionStatus::NoRecord
        );
    }
}

#[test]
fn duplicate_submission_is_idempotent() {
    let mut net = network(3);
    let sender = test_keypair(10);
    let to = derive_address(&test_keypair(11).public);
    let tx = transfer_transaction(&sender, 5, to, net.timestamp());

    let first = net.submit_transaction(1, tx.clone()).unwrap();
    assert_eq!(first.status, TransactionStatus::Pending);

    let second = net.submit_transaction(1, tx).unwrap();
    assert_eq!(second.status, TransactionStatus::Pending);
}

#[test]
fn committed_transaction_submission_returns_receipt() {
    let mut net = network(3);
    let sender = test_keypair(10);
    let to = derive_address(&test_keypair(11).public);
    let tx = transfer_transaction(&sender, 5, to, net.timestamp());
    let hash = tx.hash();

    net.submit_transaction(0, tx.clone()).unwrap();
    assert!(net.run_until_height(BlockHeight(1), DEADLINE));

    // Re-submitting the same transaction answers COMMITTED with the stored
    // receipt and commit coordinates.
    let submission = net.submit_transaction(0, tx).unwrap();
    assert_eq!(submission.status, TransactionStatus::Committed);
    let receipt = submission.receipt.expect("committed answer carries receipt");
    assert_eq!(receipt.tx_hash, hash);
    assert_eq!(submission.block_height, BlockHeight(1));
    assert!(submission.block_timestamp.0 > 0);
}

#[test]
fn commit_releases_result_notifications() {
    let mut net = network(3);
    let sender = test_keypair(10);
    let to = derive_address(&test_keypair(11).public);
    let tx = transfer_transaction(&sender, 5, to, net.timestamp());
    let hash = tx.hash();

    net.submit_transaction(0, tx).unwrap();
    assert!(net.run_until_height(BlockHeight(1), DEADLINE));

    for i in 0..net.len() {
        let receipts = net.committed_receipts(i);
        assert!(
            receipts.iter().any(|(h, r)| *h == BlockHeight(1) && r.tx_hash == hash),
            "node {i} results handler missed the commit"
        );
    }
}
