//! Transactions, receipts, and client-visible status enums.

use crate::{
    verify_signature, Argument, Hash, PrivateKey, ProtocolVersion, PublicKey, Signature,
    SignatureError, TimestampNano, VirtualChainId,
};
use sbor::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The transaction body signed by a client.
///
/// Carries the protocol version, virtual chain id, target contract and
/// method, typed input arguments, the signer's public key, and the signer's
/// intended timestamp (which doubles as the expiry anchor).
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct Transaction {
    /// Protocol version the signer targeted.
    pub protocol_version: ProtocolVersion,
    /// Virtual chain this transaction belongs to.
    pub virtual_chain_id: VirtualChainId,
    /// Target contract.
    pub contract_name: String,
    /// Target method.
    pub method_name: String,
    /// Typed input arguments.
    pub input_arguments: Vec<Argument>,
    /// Signer-supplied timestamp (nanoseconds since epoch).
    pub timestamp: TimestampNano,
    /// The signer's public key.
    pub signer: PublicKey,
}

impl Transaction {
    /// Canonical digest: SHA-256 over the canonical encoding.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("transaction encoding is infallible");
        Hash::from_bytes(&bytes)
    }

    /// Encoded size estimate used for pool and block byte budgeting.
    pub fn size_bytes(&self) -> usize {
        let args: usize = self.input_arguments.iter().map(|a| a.size_bytes()).sum();
        // fixed header fields + names + args + signature overhead
        64 + self.contract_name.len() + self.method_name.len() + args
    }
}

/// A transaction body plus the signer's signature over its digest.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct SignedTransaction {
    /// The signed body.
    pub transaction: Transaction,
    /// Ed25519 signature over `transaction.hash()`.
    pub signature: Signature,
}

impl SignedTransaction {
    /// Sign a transaction body.
    pub fn sign(transaction: Transaction, key: &PrivateKey) -> Self {
        let digest = transaction.hash();
        let signature = key.sign(digest.as_bytes());
        Self {
            transaction,
            signature,
        }
    }

    /// The canonical transaction hash (of the body, not the envelope).
    pub fn hash(&self) -> Hash {
        self.transaction.hash()
    }

    /// Verify the envelope signature against the embedded signer key.
    pub fn verify_signature(&self) -> Result<(), SignatureError> {
        let digest = self.transaction.hash();
        verify_signature(&self.transaction.signer, digest.as_bytes(), &self.signature)
    }

    /// Encoded size estimate.
    pub fn size_bytes(&self) -> usize {
        self.transaction.size_bytes() + 64
    }
}

/// Receipt stored for a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TransactionReceipt {
    /// Hash of the committed transaction.
    pub tx_hash: Hash,
    /// Outcome of execution.
    pub execution_result: ExecutionResult,
    /// Output argument array produced by the method.
    pub output_arguments: Vec<Argument>,
}

impl TransactionReceipt {
    /// Digest of this receipt, a leaf of the results block's receipts root.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("receipt encoding is infallible");
        Hash::from_bytes(&bytes)
    }
}

/// Outcome of executing a contract method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor, Serialize, Deserialize)]
pub enum ExecutionResult {
    /// The method completed normally.
    Success,
    /// The contract raised an error.
    ErrorSmartContract,
    /// Resolution or permission failure outside the contract's control.
    ErrorUnexpected,
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionResult::Success => "SUCCESS",
            ExecutionResult::ErrorSmartContract => "ERROR_SMART_CONTRACT",
            ExecutionResult::ErrorUnexpected => "ERROR_UNEXPECTED",
        };
        write!(f, "{s}")
    }
}

/// Client-visible lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Waiting in the pending pool for ordering.
    Pending,
    /// Committed in a block; a receipt exists.
    Committed,
    /// Unknown to this node.
    NoRecord,
    /// Rejected by validation; never entered the pending pool.
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Committed => "COMMITTED",
            TransactionStatus::NoRecord => "NO_RECORD_FOUND",
            TransactionStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// Request status reported to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor, Serialize, Deserialize)]
pub enum RequestStatus {
    /// The request completed; result attached.
    Completed,
    /// Accepted, still making its way through the pipeline.
    InProcess,
    /// The referenced entity is unknown.
    NotFound,
    /// The request failed validation.
    Rejected,
    /// A resource cap rejected the request; retry later.
    Congestion,
    /// Reserved internal failure.
    Reserved,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::InProcess => "IN_PROCESS",
            RequestStatus::NotFound => "NOT_FOUND",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Congestion => "CONGESTION",
            RequestStatus::Reserved => "RESERVED",
        };
        write!(f, "{s}")
    }
}

/// Contract-level verdict issued before ordering is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BasicSbor)]
pub enum PreOrderStatus {
    /// The transaction may be ordered.
    Valid,
    /// The envelope signature does not verify.
    RejectedSignatureMismatch,
    /// The pre-order contract rejected the transaction.
    RejectedContract,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_transaction;

    #[test]
    fn test_transaction_hash_deterministic() {
        let tx = test_transaction(1);
        assert_eq!(tx.hash(), tx.hash());
    }

    #[test]
    fn test_transaction_hash_covers_body() {
        let mut tx = test_transaction(1);
        let before = tx.hash();
        tx.transaction.method_name = "getBalance".to_string();
        assert_ne!(before, tx.hash());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let tx = test_transaction(3);
        let bytes = basic_encode(&tx).unwrap();
        let decoded: SignedTransaction = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(tx, decoded);
        assert_eq!(tx.hash(), decoded.hash());
    }

    #[test]
    fn test_signature_verifies() {
        let tx = test_transaction(5);
        assert!(tx.verify_signature().is_ok());
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let mut tx = test_transaction(5);
        tx.transaction.input_arguments.push(Argument::Uint64(99));
        assert!(tx.verify_signature().is_err());
    }
}
