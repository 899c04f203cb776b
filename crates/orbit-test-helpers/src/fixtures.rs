//! Deterministic keys, federations, and transaction builders.

use orbit_engine::contracts;
use orbit_types::{
    Address, Argument, Federation, KeyPair, PublicKey, SignedTransaction, TimestampNano,
    Transaction, VirtualChainId, PROTOCOL_VERSION,
};
use sbor::prelude::basic_encode;

/// The virtual chain id used throughout the test suites.
pub const TEST_CHAIN: VirtualChainId = VirtualChainId(42);

/// Deterministic keypair derived from a small integer seed.
pub fn test_keypair(seed: u8) -> KeyPair {
    orbit_types::keypair_from_seed(&[seed.wrapping_add(1); 32])
}

/// A federation of `n` members with their keypairs, seeds 0..n.
pub fn federation_with_keys(n: u8) -> (Federation, Vec<KeyPair>) {
    let keys: Vec<KeyPair> = (0..n).map(test_keypair).collect();
    let public: Vec<PublicKey> = keys.iter().map(|k| k.public).collect();
    (Federation::new(public), keys)
}

fn build(
    signer: &KeyPair,
    contract: &str,
    method: &str,
    args: Vec<Argument>,
    timestamp: TimestampNano,
) -> SignedTransaction {
    SignedTransaction::sign(
        Transaction {
            protocol_version: PROTOCOL_VERSION,
            virtual_chain_id: TEST_CHAIN,
            contract_name: contract.to_string(),
            method_name: method.to_string(),
            input_arguments: args,
            timestamp,
            signer: signer.public,
        },
        &signer.private,
    )
}

/// A signed `BenchmarkToken.transfer`.
pub fn transfer_transaction(
    signer: &KeyPair,
    amount: u64,
    to: Address,
    timestamp: TimestampNano,
) -> SignedTransaction {
    build(
        signer,
        contracts::BENCHMARK_TOKEN_CONTRACT,
        "transfer",
        vec![Argument::Uint64(amount), Argument::Bytes(to.to_vec())],
        timestamp,
    )
}

/// A signed `_Deployments.deployService` for a counter starting at `start`.
pub fn deploy_counter_transaction(
    signer: &KeyPair,
    name: &str,
    start: u64,
    timestamp: TimestampNano,
) -> SignedTransaction {
    let code = basic_encode(&start).expect("u64 encoding is infallible");
    build(
        signer,
        contracts::DEPLOYMENTS_CONTRACT,
        "deployService",
        vec![Argument::String(name.to_string()), Argument::Bytes(code)],
        timestamp,
    )
}

/// A signed `Counter.add`.
pub fn counter_add_transaction(
    signer: &KeyPair,
    name: &str,
    amount: u64,
    timestamp: TimestampNano,
) -> SignedTransaction {
    build(
        signer,
        name,
        "add",
        vec![Argument::Uint64(amount)],
        timestamp,
    )
}

/// An unsigned read-only `Counter.get` call body.
pub fn counter_get_call(signer: &KeyPair, name: &str, timestamp: TimestampNano) -> Transaction {
    Transaction {
        protocol_version: PROTOCOL_VERSION,
        virtual_chain_id: TEST_CHAIN,
        contract_name: name.to_string(),
        method_name: "get".to_string(),
        input_arguments: vec![],
        timestamp,
        signer: signer.public,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypairs_are_deterministic() {
        assert_eq!(test_keypair(0).public, test_keypair(0).public);
        assert_ne!(test_keypair(0).public, test_keypair(1).public);
    }

    #[test]
    fn test_built_transactions_verify() {
        let keys = test_keypair(0);
        let to = orbit_types::derive_address(&test_keypair(1).public);
        let tx = transfer_transaction(&keys, 10, to, TimestampNano(1_000_000_000));
        assert!(tx.verify_signature().is_ok());
    }
}
