//! In-memory contract state snapshot.

use orbit_storage::{StatePersistence, StateStoreError};
use orbit_types::{BlockHeight, ContractStateDiff};
use parking_lot::RwLock;
use std::collections::HashMap;

type ContractState = HashMap<Vec<u8>, Vec<u8>>;

struct Inner {
    contracts: HashMap<String, ContractState>,
    applied_height: BlockHeight,
}

/// State snapshot keyed by contract name → variable name → raw bytes.
pub struct InMemoryStateStore {
    inner: RwLock<Inner>,
}

impl InMemoryStateStore {
    /// Create an empty snapshot at height 0.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                contracts: HashMap::new(),
                applied_height: BlockHeight(0),
            }),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatePersistence for InMemoryStateStore {
    fn read(&self, contract_name: &str, key: &[u8]) -> Option<Vec<u8>> {
        self.inner
            .read()
            .contracts
            .get(contract_name)
            .and_then(|state| state.get(key).cloned())
    }

    fn apply(
        &self,
        height: BlockHeight,
        diffs: &[ContractStateDiff],
    ) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write();

        if height != inner.applied_height.next() {
            return Err(StateStoreError::OutOfOrderApply {
                snapshot: inner.applied_height,
                diff: height,
            });
        }

        for diff in diffs {
            let state = inner
                .contracts
                .entry(diff.contract_name.clone())
                .or_default();
            for record in &diff.records {
                if record.value.is_empty() {
                    state.remove(&record.key);
                } else {
                    state.insert(record.key.clone(), record.value.clone());
                }
            }
        }

        inner.applied_height = height;
        Ok(())
    }

    fn applied_height(&self) -> BlockHeight {
        self.inner.read().applied_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::StateRecord;

    fn diff(contract: &str, key: &[u8], value: &[u8]) -> ContractStateDiff {
        ContractStateDiff {
            contract_name: contract.to_string(),
            records: vec![StateRecord {
                key: key.to_vec(),
                value: value.to_vec(),
            }],
        }
    }

    #[test]
    fn test_apply_and_read() {
        let store = InMemoryStateStore::new();
        store
            .apply(BlockHeight(1), &[diff("Counter", b"count", &100u64.to_le_bytes())])
            .unwrap();

        assert_eq!(
            store.read("Counter", b"count"),
            Some(100u64.to_le_bytes().to_vec())
        );
        assert_eq!(store.read("Counter", b"other"), None);
        assert_eq!(store.read("Other", b"count"), None);
        assert_eq!(store.applied_height(), BlockHeight(1));
    }

    #[test]
    fn test_later_write_wins() {
        let store = InMemoryStateStore::new();
        store
            .apply(BlockHeight(1), &[diff("C", b"k", b"v1")])
            .unwrap();
        store
            .apply(BlockHeight(2), &[diff("C", b"k", b"v2")])
            .unwrap();
        assert_eq!(store.read("C", b"k"), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_empty_value_deletes() {
        let store = InMemoryStateStore::new();
        store
            .apply(BlockHeight(1), &[diff("C", b"k", b"v")])
            .unwrap();
        store.apply(BlockHeight(2), &[diff("C", b"k", b"")]).unwrap();
        assert_eq!(store.read("C", b"k"), None);
    }

    #[test]
    fn test_out_of_order_apply_rejected() {
        let store = InMemoryStateStore::new();
        assert!(matches!(
            store.apply(BlockHeight(2), &[]),
            Err(StateStoreError::OutOfOrderApply { .. })
        ));
    }
}
