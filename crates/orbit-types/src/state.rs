//! State diff types carried by results blocks.

use crate::Hash;
use sbor::prelude::*;

/// A single key/value write produced by contract execution.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct StateRecord {
    /// Variable name within the contract's namespace.
    pub key: Vec<u8>,
    /// New raw value. Empty means deletion.
    pub value: Vec<u8>,
}

/// All writes a transaction set produced under one contract's namespace.
///
/// Records are ordered by write sequence; later writes to the same key have
/// already been collapsed by the execution overlay.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ContractStateDiff {
    /// The owning contract.
    pub contract_name: String,
    /// Ordered writes.
    pub records: Vec<StateRecord>,
}

impl ContractStateDiff {
    /// Digest over the canonical encoding, folded into the results block.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("state diff encoding is infallible");
        Hash::from_bytes(&bytes)
    }
}

/// Digest over an ordered list of contract diffs.
///
/// Returns `Hash::ZERO` for an empty list so empty blocks are stable.
pub fn compute_state_diff_hash(diffs: &[ContractStateDiff]) -> Hash {
    if diffs.is_empty() {
        return Hash::ZERO;
    }
    let hashes: Vec<Hash> = diffs.iter().map(|d| d.hash()).collect();
    crate::compute_merkle_root(&hashes)
}
