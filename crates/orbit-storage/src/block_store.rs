//! Append-only block pair log.

use orbit_types::{BlockHeight, BlockPair, Hash};

/// Errors from the block pair log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockStoreError {
    /// Append would break the single-extending-chain sequence.
    #[error("append out of order: expected height {expected}, got {actual}")]
    OutOfOrderAppend {
        /// The only height an append may carry.
        expected: BlockHeight,
        /// The height that was offered.
        actual: BlockHeight,
    },

    /// Append does not link to the stored predecessor.
    ///
    /// The chain invariant is broken at persist time; callers treat this
    /// as fatal.
    #[error("append at height {height} does not link to stored predecessor")]
    BrokenChainLink {
        /// The offered height.
        height: BlockHeight,
        /// Hash the block claims as predecessor.
        claimed_prev: Hash,
        /// Hash of the actual stored predecessor.
        stored_prev: Hash,
    },
}

/// The committed block pair log: append-only, height-indexed.
///
/// Heights start at 1; height 0 has no block.
pub trait BlockPersistence: Send + Sync {
    /// Append the next block pair.
    ///
    /// Must be called with exactly `last_committed_height() + 1` and a
    /// `prev_block_hash` matching the stored predecessor's transactions
    /// block hash.
    fn append(&self, pair: BlockPair) -> Result<(), BlockStoreError>;

    /// The current tip height (0 when the log is empty).
    fn last_committed_height(&self) -> BlockHeight;

    /// The block pair at the tip, if any.
    fn last_committed_block(&self) -> Option<BlockPair>;

    /// The block pair at a height, if committed.
    fn block_at(&self, height: BlockHeight) -> Option<BlockPair>;

    /// Block pairs in `[first, last]`, ascending, capped at `max` entries.
    ///
    /// The range is clamped to what the log holds; an empty Vec means the
    /// range is entirely above the tip.
    fn blocks_in_range(&self, first: BlockHeight, last: BlockHeight, max: usize) -> Vec<BlockPair>;
}
