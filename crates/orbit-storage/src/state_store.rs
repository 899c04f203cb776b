//! Contract state snapshot.

use orbit_types::{BlockHeight, ContractStateDiff};

/// Errors from the state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateStoreError {
    /// Diffs applied out of height order.
    #[error("apply out of order: snapshot at height {snapshot}, diff for {diff}")]
    OutOfOrderApply {
        /// Height the snapshot has applied through.
        snapshot: BlockHeight,
        /// Height of the rejected diff batch.
        diff: BlockHeight,
    },
}

/// The state snapshot: contract name → variable name → raw bytes.
///
/// Advanced exactly once per committed block by applying the results
/// block's diffs; reads see the last committed value.
pub trait StatePersistence: Send + Sync {
    /// Read one variable of one contract. `None` when never written or
    /// deleted.
    fn read(&self, contract_name: &str, key: &[u8]) -> Option<Vec<u8>>;

    /// Apply a committed block's diffs. `height` must be exactly
    /// `applied_height() + 1`.
    ///
    /// An empty value deletes the key.
    fn apply(&self, height: BlockHeight, diffs: &[ContractStateDiff])
        -> Result<(), StateStoreError>;

    /// Height the snapshot has applied through (0 initially).
    fn applied_height(&self) -> BlockHeight;
}
