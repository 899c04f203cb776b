//! In-memory block pair log.

use orbit_storage::{BlockPersistence, BlockStoreError};
use orbit_types::{BlockHeight, BlockPair, Hash};
use parking_lot::RwLock;

/// Append-only log of committed block pairs, indexed by height.
///
/// `blocks[i]` holds height `i + 1`. The append pointer is single-writer
/// (only consensus commits); readers take the shared lock.
pub struct InMemoryBlockStore {
    blocks: RwLock<Vec<BlockPair>>,
}

impl InMemoryBlockStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPersistence for InMemoryBlockStore {
    fn append(&self, pair: BlockPair) -> Result<(), BlockStoreError> {
        let mut blocks = self.blocks.write();

        let expected = BlockHeight(blocks.len() as u64 + 1);
        let actual = pair.height();
        if actual != expected {
            return Err(BlockStoreError::OutOfOrderAppend { expected, actual });
        }

        let stored_prev = blocks.last().map(|b| b.hash()).unwrap_or(Hash::ZERO);
        let claimed_prev = pair.transactions_block.header.prev_block_hash;
        if claimed_prev != stored_prev {
            return Err(BlockStoreError::BrokenChainLink {
                height: actual,
                claimed_prev,
                stored_prev,
            });
        }

        blocks.push(pair);
        Ok(())
    }

    fn last_committed_height(&self) -> BlockHeight {
        BlockHeight(self.blocks.read().len() as u64)
    }

    fn last_committed_block(&self) -> Option<BlockPair> {
        self.blocks.read().last().cloned()
    }

    fn block_at(&self, height: BlockHeight) -> Option<BlockPair> {
        if height.0 == 0 {
            return None;
        }
        self.blocks.read().get(height.0 as usize - 1).cloned()
    }

    fn blocks_in_range(&self, first: BlockHeight, last: BlockHeight, max: usize) -> Vec<BlockPair> {
        if first.0 == 0 || last < first || max == 0 {
            return Vec::new();
        }
        let blocks = self.blocks.read();
        let tip = blocks.len() as u64;
        if first.0 > tip {
            return Vec::new();
        }
        let clamped_last = last.0.min(tip).min(first.0 + max as u64 - 1);
        blocks[(first.0 as usize - 1)..(clamped_last as usize)].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::test_utils::test_transaction;
    use orbit_types::{
        compute_receipts_root, compute_transactions_root, Argument, ExecutionResult,
        ResultsBlock, ResultsBlockHeader, TimestampNano, TransactionReceipt, TransactionsBlock,
        TransactionsBlockHeader, VirtualChainId, PROTOCOL_VERSION,
    };

    fn pair_linking(height: u64, prev: Hash) -> BlockPair {
        let txs = vec![test_transaction(height as u8)];
        let receipts = vec![TransactionReceipt {
            tx_hash: txs[0].hash(),
            execution_result: ExecutionResult::Success,
            output_arguments: vec![Argument::Uint64(height)],
        }];
        let tx_block = TransactionsBlock {
            header: TransactionsBlockHeader {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: VirtualChainId(42),
                height: BlockHeight(height),
                prev_block_hash: prev,
                timestamp: TimestampNano(height * 1_000),
                tx_merkle_root: compute_transactions_root(&txs),
                num_transactions: txs.len() as u32,
            },
            transactions: txs,
        };
        let results_block = ResultsBlock {
            header: ResultsBlockHeader {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: VirtualChainId(42),
                height: BlockHeight(height),
                prev_block_hash: prev,
                timestamp: tx_block.header.timestamp,
                transactions_block_hash: tx_block.hash(),
                receipts_merkle_root: compute_receipts_root(&receipts),
                state_diff_hash: Hash::ZERO,
                num_receipts: 1,
            },
            receipts,
            state_diffs: vec![],
        };
        BlockPair {
            transactions_block: tx_block,
            results_block,
        }
    }

    fn chain(store: &InMemoryBlockStore, up_to: u64) {
        let mut prev = Hash::ZERO;
        for h in 1..=up_to {
            let pair = pair_linking(h, prev);
            prev = pair.hash();
            store.append(pair).unwrap();
        }
    }

    #[test]
    fn test_append_and_lookup() {
        let store = InMemoryBlockStore::new();
        chain(&store, 3);

        assert_eq!(store.last_committed_height(), BlockHeight(3));
        assert_eq!(store.block_at(BlockHeight(2)).unwrap().height(), BlockHeight(2));
        assert!(store.block_at(BlockHeight(0)).is_none());
        assert!(store.block_at(BlockHeight(4)).is_none());
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let store = InMemoryBlockStore::new();
        chain(&store, 1);

        let skip = pair_linking(3, store.last_committed_block().unwrap().hash());
        assert!(matches!(
            store.append(skip),
            Err(BlockStoreError::OutOfOrderAppend { .. })
        ));
    }

    #[test]
    fn test_broken_link_rejected() {
        let store = InMemoryBlockStore::new();
        chain(&store, 1);

        let unlinked = pair_linking(2, Hash::from_bytes(b"wrong"));
        assert!(matches!(
            store.append(unlinked),
            Err(BlockStoreError::BrokenChainLink { .. })
        ));
    }

    #[test]
    fn test_range_clamped_to_tip_and_max() {
        let store = InMemoryBlockStore::new();
        chain(&store, 5);

        let range = store.blocks_in_range(BlockHeight(2), BlockHeight(100), 10);
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].height(), BlockHeight(2));

        let capped = store.blocks_in_range(BlockHeight(1), BlockHeight(5), 2);
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].height(), BlockHeight(2));

        assert!(store
            .blocks_in_range(BlockHeight(6), BlockHeight(10), 5)
            .is_empty());
    }
}
