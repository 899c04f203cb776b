//! The committed sub-pool.

use orbit_types::{BlockHeight, Hash, TimestampNano, TransactionReceipt};
use std::collections::HashMap;
use std::time::Duration;

/// A committed receipt with its commit coordinates.
#[derive(Debug, Clone)]
pub struct CommittedEntry {
    /// The stored receipt.
    pub receipt: TransactionReceipt,
    /// Height the transaction committed at.
    pub block_height: BlockHeight,
    /// Timestamp of the committing block.
    pub block_timestamp: TimestampNano,
    /// Local clock when the commit was observed, for the sweeper.
    committed_at: Duration,
}

/// Mapping from transaction hash to committed receipt.
///
/// Entries age out past the expiration window; within the window they make
/// duplicate submissions answerable with the original receipt.
pub struct CommittedPool {
    entries: HashMap<Hash, CommittedEntry>,
}

impl CommittedPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Record a committed receipt. Idempotent: an existing entry wins.
    pub fn add(
        &mut self,
        receipt: TransactionReceipt,
        block_height: BlockHeight,
        block_timestamp: TimestampNano,
        committed_at: Duration,
    ) {
        self.entries
            .entry(receipt.tx_hash)
            .or_insert(CommittedEntry {
                receipt,
                block_height,
                block_timestamp,
                committed_at,
            });
    }

    /// Look up a committed entry.
    pub fn get(&self, hash: &Hash) -> Option<&CommittedEntry> {
        self.entries.get(hash)
    }

    /// Whether a transaction has committed.
    pub fn has(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// Delete entries committed before `cutoff`. Returns how many were
    /// swept.
    pub fn clear_transactions_older_than(&mut self, cutoff: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.committed_at >= cutoff);
        before - self.entries.len()
    }

    /// Number of stored receipts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommittedPool {
    fn default() -> Self {
        Self::new()
    }
}
