//! The pending sub-pool.

use orbit_types::{Hash, SignedTransaction, ValidatorId};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;

/// Errors from pending-pool insertion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingPoolError {
    /// The byte cap is reached; the caller sees a congestion status.
    #[error("pending pool is full: {used} of {cap} bytes used")]
    Congestion {
        /// Bytes currently held.
        used: usize,
        /// The configured cap.
        cap: usize,
    },

    /// The transaction is already pending.
    #[error("transaction {0} already pending")]
    Duplicate(Hash),
}

/// One pending entry.
#[derive(Debug, Clone)]
struct PendingEntry {
    tx: SignedTransaction,
    size_bytes: usize,
    added_at: Duration,
    /// The peer that relayed this transaction, `None` for local clients.
    relayed_from: Option<ValidatorId>,
}

/// Insertion-ordered mapping from transaction hash to pending entry, under
/// a total-size-in-bytes cap.
///
/// Insertion order is preserved and is the order transactions are offered
/// to block assembly.
pub struct PendingPool {
    entries: HashMap<Hash, PendingEntry>,
    order: VecDeque<Hash>,
    total_bytes: usize,
    cap_bytes: usize,
}

impl PendingPool {
    /// Create an empty pool with the given byte cap.
    pub fn new(cap_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            total_bytes: 0,
            cap_bytes,
        }
    }

    /// Insert a transaction.
    pub fn add(
        &mut self,
        tx: SignedTransaction,
        added_at: Duration,
        relayed_from: Option<ValidatorId>,
    ) -> Result<Hash, PendingPoolError> {
        let hash = tx.hash();
        if self.entries.contains_key(&hash) {
            return Err(PendingPoolError::Duplicate(hash));
        }

        let size_bytes = tx.size_bytes();
        if self.total_bytes + size_bytes > self.cap_bytes {
            return Err(PendingPoolError::Congestion {
                used: self.total_bytes,
                cap: self.cap_bytes,
            });
        }

        self.total_bytes += size_bytes;
        self.entries.insert(
            hash,
            PendingEntry {
                tx,
                size_bytes,
                added_at,
                relayed_from,
            },
        );
        self.order.push_back(hash);
        Ok(hash)
    }

    /// Remove a transaction, returning it if present.
    ///
    /// The order queue keeps a stale hash until the next batch walk; the
    /// entry map is authoritative.
    pub fn remove(&mut self, hash: &Hash) -> Option<SignedTransaction> {
        let entry = self.entries.remove(hash)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry.tx)
    }

    /// Whether a transaction is pending.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.entries.contains_key(hash)
    }

    /// The relay source recorded for a pending transaction.
    pub fn relay_source(&self, hash: &Hash) -> Option<ValidatorId> {
        self.entries.get(hash).and_then(|e| e.relayed_from)
    }

    /// Transactions in insertion order, limited by count and total bytes.
    pub fn get_batch(&mut self, max_count: usize, max_bytes: usize) -> Vec<SignedTransaction> {
        // Drop stale front entries left behind by removals.
        while let Some(front) = self.order.front() {
            if self.entries.contains_key(front) {
                break;
            }
            self.order.pop_front();
        }

        let mut batch = Vec::new();
        let mut bytes = 0usize;
        for hash in &self.order {
            if batch.len() >= max_count {
                break;
            }
            let Some(entry) = self.entries.get(hash) else {
                continue;
            };
            if bytes + entry.size_bytes > max_bytes && !batch.is_empty() {
                break;
            }
            bytes += entry.size_bytes;
            batch.push(entry.tx.clone());
        }
        batch
    }

    /// Delete entries added before `cutoff`. Returns how many were swept.
    pub fn clear_transactions_older_than(&mut self, cutoff: Duration) -> usize {
        let expired: Vec<Hash> = self
            .entries
            .iter()
            .filter(|(_, e)| e.added_at < cutoff)
            .map(|(h, _)| *h)
            .collect();
        for hash in &expired {
            self.remove(hash);
        }
        expired.len()
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::test_utils::test_transaction;

    #[test]
    fn test_add_and_duplicate() {
        let mut pool = PendingPool::new(1 << 20);
        let tx = test_transaction(1);
        pool.add(tx.clone(), Duration::ZERO, None).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(matches!(
            pool.add(tx, Duration::ZERO, None),
            Err(PendingPoolError::Duplicate(_))
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_congestion_at_byte_cap() {
        let tx = test_transaction(1);
        let mut pool = PendingPool::new(tx.size_bytes() + 10);
        pool.add(tx, Duration::ZERO, None).unwrap();
        assert!(matches!(
            pool.add(test_transaction(2), Duration::ZERO, None),
            Err(PendingPoolError::Congestion { .. })
        ));
    }

    #[test]
    fn test_batch_preserves_insertion_order() {
        let mut pool = PendingPool::new(1 << 20);
        let txs: Vec<_> = (1..=4u8).map(test_transaction).collect();
        for tx in &txs {
            pool.add(tx.clone(), Duration::ZERO, None).unwrap();
        }

        let batch = pool.get_batch(10, usize::MAX);
        let got: Vec<_> = batch.iter().map(|t| t.hash()).collect();
        let want: Vec<_> = txs.iter().map(|t| t.hash()).collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_batch_respects_count_cap() {
        let mut pool = PendingPool::new(1 << 20);
        for i in 1..=5u8 {
            pool.add(test_transaction(i), Duration::ZERO, None).unwrap();
        }
        assert_eq!(pool.get_batch(3, usize::MAX).len(), 3);
    }

    #[test]
    fn test_batch_skips_removed() {
        let mut pool = PendingPool::new(1 << 20);
        let a = test_transaction(1);
        let b = test_transaction(2);
        pool.add(a.clone(), Duration::ZERO, None).unwrap();
        pool.add(b.clone(), Duration::ZERO, None).unwrap();
        pool.remove(&a.hash());

        let batch = pool.get_batch(10, usize::MAX);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].hash(), b.hash());
    }

    #[test]
    fn test_expiry_sweep() {
        let mut pool = PendingPool::new(1 << 20);
        pool.add(test_transaction(1), Duration::from_secs(10), None)
            .unwrap();
        pool.add(test_transaction(2), Duration::from_secs(100), None)
            .unwrap();

        let swept = pool.clear_transactions_older_than(Duration::from_secs(50));
        assert_eq!(swept, 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_bytes_tracked_through_remove() {
        let mut pool = PendingPool::new(1 << 20);
        let tx = test_transaction(1);
        let size = tx.size_bytes();
        pool.add(tx.clone(), Duration::ZERO, None).unwrap();
        assert_eq!(pool.total_bytes(), size);
        pool.remove(&tx.hash());
        assert_eq!(pool.total_bytes(), 0);
    }
}
