//! Whole-network consensus scenarios: contract deploy + invoke replicated
//! across the leader and every validator, and chain invariants.

mod common;

use common::network;
use orbit_engine::contracts;
use orbit_test_helpers::{
    counter_add_transaction, counter_get_call, deploy_counter_transaction, test_keypair,
    transfer_transaction,
};
use orbit_types::{
    derive_address, Argument, BlockHeight, ExecutionResult, TimestampNano, Transaction,
    TransactionStatus, PROTOCOL_VERSION,
};
use orbit_test_helpers::TEST_CHAIN;
use std::time::Duration;

const DEADLINE: Duration = Duration::from_secs(60);
const COUNTER: &str = "CounterExample";

#[test]
fn non_leader_deploys_counter_and_every_node_serves_it() {
    let mut net = network(4);
    let deployer = test_keypair(20);

    // Deploy with start value 100, submitted at a validator.
    let deploy = deploy_counter_transaction(&deployer, COUNTER, 100, net.timestamp());
    net.submit_transaction(1, deploy).unwrap();
    assert!(net.run_until_height(BlockHeight(1), DEADLINE));

    // get() returns 100 on the leader and every validator.
    for i in 0..net.len() {
        let call = counter_get_call(&deployer, COUNTER, net.timestamp());
        let (output, result, _) = net.call_method(i, &call);
        assert_eq!(result, ExecutionResult::Success, "node {i} call failed");
        assert_eq!(output[0].as_u64(), Some(100), "node {i} wrong counter");
    }

    // add(17) commits through consensus.
    let add = counter_add_transaction(&deployer, COUNTER, 17, net.timestamp());
    let hash = add.hash();
    net.submit_transaction(2, add).unwrap();
    assert!(net.run_until_height(BlockHeight(2), DEADLINE));

    for i in 0..net.len() {
        let status = net.transaction_status(i, &hash);
        assert_eq!(status.status, TransactionStatus::Committed);
        assert_eq!(
            status.receipt.unwrap().execution_result,
            ExecutionResult::Success
        );

        let call = counter_get_call(&deployer, COUNTER, net.timestamp());
        let (output, result, _) = net.call_method(i, &call);
        assert_eq!(result, ExecutionResult::Success);
        assert_eq!(output[0].as_u64(), Some(117), "node {i} wrong counter");
    }
}

#[test]
fn token_transfer_replicates_balances() {
    let mut net = network(4);
    let from = test_keypair(21);
    let to = test_keypair(22);
    let to_address = derive_address(&to.public);

    let tx = transfer_transaction(&from, 250, to_address, net.timestamp());
    net.submit_transaction(3, tx).unwrap();
    assert!(net.run_until_height(BlockHeight(1), DEADLINE));

    let faucet = contracts::benchmark_token::FAUCET_BALANCE;
    for i in 0..net.len() {
        let balance = |address: Vec<u8>| {
            let call = Transaction {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: TEST_CHAIN,
                contract_name: contracts::BENCHMARK_TOKEN_CONTRACT.to_string(),
                method_name: "getBalance".to_string(),
                input_arguments: vec![Argument::Bytes(address)],
                timestamp: net.timestamp(),
                signer: from.public,
            };
            let (output, result, _) = net.call_method(i, &call);
            assert_eq!(result, ExecutionResult::Success);
            output[0].as_u64().unwrap()
        };

        assert_eq!(balance(derive_address(&from.public).to_vec()), faucet - 250);
        assert_eq!(balance(to_address.to_vec()), faucet + 250);
    }
}

#[test]
fn committed_chain_holds_pair_and_timestamp_invariants() {
    let mut net = network(4);
    let sender = test_keypair(23);
    let to = derive_address(&test_keypair(24).public);

    // Commit three blocks, one transaction each.
    for round in 0..3u64 {
        let tx = transfer_transaction(&sender, round + 1, to, net.timestamp());
        net.submit_transaction(0, tx).unwrap();
        assert!(net.run_until_height(BlockHeight(round + 1), DEADLINE));
    }

    for i in 0..net.len() {
        let mut prev_timestamp = TimestampNano(0);
        let mut prev_hash = None;
        for height in 1..=3u64 {
            let pair = net
                .block_at(i, BlockHeight(height))
                .expect("committed block readable");

            // Pair link: results block references its transactions block.
            assert_eq!(
                pair.results_block.header.transactions_block_hash,
                pair.transactions_block.hash(),
            );
            // Strictly increasing timestamps.
            assert!(pair.timestamp() > prev_timestamp);
            // Chain link to the predecessor.
            if let Some(prev_hash) = prev_hash {
                assert_eq!(pair.transactions_block.header.prev_block_hash, prev_hash);
            }

            prev_timestamp = pair.timestamp();
            prev_hash = Some(pair.hash());
        }
    }

    // All nodes agree bit-exactly on every block.
    for height in 1..=3u64 {
        let reference = net.block_at(0, BlockHeight(height)).unwrap();
        for i in 1..net.len() {
            assert_eq!(net.block_at(i, BlockHeight(height)).unwrap(), reference);
        }
    }
}
