//! Core types for the Orbit node.
//!
//! This crate provides the foundational types used throughout the node:
//!
//! - **Primitives**: Hash, cryptographic keys and signatures, addresses
//! - **Identifiers**: ValidatorId, BlockHeight, TimestampNano, VirtualChainId
//! - **Protocol types**: SignedTransaction, TransactionReceipt, BlockPair
//! - **Federation**: the static validator set and quorum arithmetic
//! - **Network traits**: message markers for serialization and routing
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. All
//! consensus-visible types carry canonical SBOR encodings; digests are
//! SHA-256 over those encodings.

mod argument;
mod block;
mod crypto;
mod hash;
mod identifiers;
mod network;
mod state;
mod transaction;

// Federation / validator set
mod federation;

pub use argument::Argument;
pub use block::{
    compute_receipts_root, compute_transactions_root, BlockPair, BlockPairError, ResultsBlock,
    ResultsBlockHeader, TransactionsBlock, TransactionsBlockHeader,
};
pub use crypto::{
    derive_address, generate_keypair, keypair_from_seed, verify_signature, Address, KeyPair,
    PrivateKey, PublicKey, Signature, SignatureError, ADDRESS_LENGTH,
};
pub use federation::{Federation, ValidatorInfo};
pub use hash::{compute_merkle_root, Hash, HexError};
pub use identifiers::{
    BlockHeight, ProtocolVersion, TimestampNano, ValidatorId, VirtualChainId, PROTOCOL_VERSION,
};
pub use network::{GossipTopic, MessagePriority, NetworkMessage};
pub use state::{compute_state_diff_hash, ContractStateDiff, StateRecord};
pub use transaction::{
    ExecutionResult, PreOrderStatus, RequestStatus, SignedTransaction, Transaction,
    TransactionReceipt, TransactionStatus,
};

/// Test utilities shared by unit tests across the workspace.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Deterministic keypair derived from a small integer seed.
    pub fn test_keypair(seed: u8) -> KeyPair {
        keypair_from_seed(&[seed; 32])
    }

    /// A signed transfer-shaped transaction with a fixed timestamp.
    pub fn test_transaction(seed: u8) -> SignedTransaction {
        let keys = test_keypair(seed);
        let tx = Transaction {
            protocol_version: PROTOCOL_VERSION,
            virtual_chain_id: VirtualChainId(42),
            contract_name: "BenchmarkToken".to_string(),
            method_name: "transfer".to_string(),
            input_arguments: vec![
                Argument::Uint64(seed as u64),
                Argument::Bytes(vec![seed; ADDRESS_LENGTH]),
            ],
            timestamp: TimestampNano(1_000_000_000 + seed as u64),
            signer: keys.public,
        };
        SignedTransaction::sign(tx, &keys.private)
    }
}
