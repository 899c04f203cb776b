//! Transactions blocks, results blocks, and the committed block pair.

use crate::{
    compute_merkle_root, ContractStateDiff, Hash, ProtocolVersion, SignedTransaction,
    TimestampNano, TransactionReceipt, VirtualChainId,
};
use crate::identifiers::BlockHeight;
use sbor::prelude::*;

/// Compute the merkle root over a transaction set.
///
/// Leaves are the canonical transaction hashes in block order.
/// Returns `Hash::ZERO` for an empty set.
pub fn compute_transactions_root(transactions: &[SignedTransaction]) -> Hash {
    let leaves: Vec<Hash> = transactions.iter().map(|tx| tx.hash()).collect();
    compute_merkle_root(&leaves)
}

/// Compute the merkle root over a receipt set.
pub fn compute_receipts_root(receipts: &[TransactionReceipt]) -> Hash {
    let leaves: Vec<Hash> = receipts.iter().map(|r| r.hash()).collect();
    compute_merkle_root(&leaves)
}

/// Header of the transactions block: the ordering half of a block pair.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TransactionsBlockHeader {
    /// Protocol version of the block format.
    pub protocol_version: ProtocolVersion,
    /// Virtual chain the block belongs to.
    pub virtual_chain_id: VirtualChainId,
    /// Height of this block. Starts at 1.
    pub height: BlockHeight,
    /// Hash of the predecessor transactions block. `Hash::ZERO` at height 1.
    pub prev_block_hash: Hash,
    /// Proposal timestamp. Strictly greater than the predecessor's.
    pub timestamp: TimestampNano,
    /// Merkle root over the ordered transaction set.
    pub tx_merkle_root: Hash,
    /// Number of transactions in the block.
    pub num_transactions: u32,
}

/// The ordering half of a block pair: header plus the ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct TransactionsBlock {
    /// Header fields validators mirror bit-exactly.
    pub header: TransactionsBlockHeader,
    /// The ordered transaction set.
    pub transactions: Vec<SignedTransaction>,
}

impl TransactionsBlock {
    /// Canonical digest over the whole encoded block.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("transactions block encoding is infallible");
        Hash::from_bytes(&bytes)
    }
}

/// Header of the results block: the execution half of a block pair.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ResultsBlockHeader {
    /// Protocol version of the block format.
    pub protocol_version: ProtocolVersion,
    /// Virtual chain the block belongs to.
    pub virtual_chain_id: VirtualChainId,
    /// Height, equal to the paired transactions block's height.
    pub height: BlockHeight,
    /// Hash of the predecessor transactions block.
    pub prev_block_hash: Hash,
    /// Timestamp copied from the paired transactions block.
    pub timestamp: TimestampNano,
    /// Hash of the paired transactions block. The pair link.
    pub transactions_block_hash: Hash,
    /// Merkle root over the receipt set.
    pub receipts_merkle_root: Hash,
    /// Digest of the ordered state diffs.
    pub state_diff_hash: Hash,
    /// Number of receipts (equals the number of transactions).
    pub num_receipts: u32,
}

/// The execution half of a block pair.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct ResultsBlock {
    /// Header fields validators mirror bit-exactly.
    pub header: ResultsBlockHeader,
    /// Receipts in transaction order.
    pub receipts: Vec<TransactionReceipt>,
    /// State diffs produced by executing the transaction set.
    pub state_diffs: Vec<ContractStateDiff>,
}

impl ResultsBlock {
    /// Canonical digest over the whole encoded block.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("results block encoding is infallible");
        Hash::from_bytes(&bytes)
    }
}

/// The two logically-linked blocks produced together at each height.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct BlockPair {
    /// Ordering half.
    pub transactions_block: TransactionsBlock,
    /// Execution half.
    pub results_block: ResultsBlock,
}

/// Structural violations of the block pair invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockPairError {
    /// Halves disagree on height.
    #[error("height mismatch: transactions block {tx}, results block {rx}")]
    HeightMismatch {
        /// Transactions block height.
        tx: BlockHeight,
        /// Results block height.
        rx: BlockHeight,
    },

    /// The results block does not link to its transactions block.
    #[error("results block links {linked}, expected {expected}")]
    BrokenPairLink {
        /// Hash recorded in the results header.
        linked: Hash,
        /// Actual transactions block hash.
        expected: Hash,
    },

    /// Halves disagree on the predecessor.
    #[error("prev block hash mismatch between pair halves")]
    PrevHashMismatch,
}

impl BlockPair {
    /// Height shared by both halves.
    pub fn height(&self) -> BlockHeight {
        self.transactions_block.header.height
    }

    /// The pair's timestamp.
    pub fn timestamp(&self) -> TimestampNano {
        self.transactions_block.header.timestamp
    }

    /// Hash identifying the pair: the transactions block hash.
    pub fn hash(&self) -> Hash {
        self.transactions_block.hash()
    }

    /// Verify the internal invariants of the pair.
    ///
    /// `results.transactions_block_hash == hash(transactions_block)`, equal
    /// heights, and matching predecessor hashes.
    pub fn verify_internal_consistency(&self) -> Result<(), BlockPairError> {
        let tx_header = &self.transactions_block.header;
        let rx_header = &self.results_block.header;

        if tx_header.height != rx_header.height {
            return Err(BlockPairError::HeightMismatch {
                tx: tx_header.height,
                rx: rx_header.height,
            });
        }

        let tx_block_hash = self.transactions_block.hash();
        if rx_header.transactions_block_hash != tx_block_hash {
            return Err(BlockPairError::BrokenPairLink {
                linked: rx_header.transactions_block_hash,
                expected: tx_block_hash,
            });
        }

        if tx_header.prev_block_hash != rx_header.prev_block_hash {
            return Err(BlockPairError::PrevHashMismatch);
        }

        Ok(())
    }

    /// Encoded size of the pair in bytes.
    pub fn size_bytes(&self) -> usize {
        basic_encode(self).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_transaction;
    use crate::{Argument, ExecutionResult, PROTOCOL_VERSION};

    fn test_pair(height: u64) -> BlockPair {
        let txs = vec![test_transaction(height as u8)];
        let receipts = vec![TransactionReceipt {
            tx_hash: txs[0].hash(),
            execution_result: ExecutionResult::Success,
            output_arguments: vec![Argument::Uint64(1)],
        }];

        let tx_block = TransactionsBlock {
            header: TransactionsBlockHeader {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: VirtualChainId(42),
                height: BlockHeight(height),
                prev_block_hash: Hash::ZERO,
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
                prev_block_hash: Hash::ZERO,
                timestamp: tx_block.header.timestamp,
                transactions_block_hash: tx_block.hash(),
                receipts_merkle_root: compute_receipts_root(&receipts),
                state_diff_hash: Hash::ZERO,
                num_receipts: receipts.len() as u32,
            },
            receipts,
            state_diffs: vec![],
        };

        BlockPair {
            transactions_block: tx_block,
            results_block,
        }
    }

    #[test]
    fn test_consistent_pair_passes() {
        assert!(test_pair(1).verify_internal_consistency().is_ok());
    }

    #[test]
    fn test_broken_link_detected() {
        let mut pair = test_pair(1);
        pair.results_block.header.transactions_block_hash = Hash::from_bytes(b"bogus");
        assert!(matches!(
            pair.verify_internal_consistency(),
            Err(BlockPairError::BrokenPairLink { .. })
        ));
    }

    #[test]
    fn test_height_mismatch_detected() {
        let mut pair = test_pair(1);
        pair.results_block.header.height = BlockHeight(2);
        assert!(matches!(
            pair.verify_internal_consistency(),
            Err(BlockPairError::HeightMismatch { .. })
        ));
    }

    #[test]
    fn test_pair_encode_roundtrip() {
        let pair = test_pair(3);
        let bytes = basic_encode(&pair).unwrap();
        let decoded: BlockPair = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(pair, decoded);
        assert_eq!(pair.hash(), decoded.hash());
    }
}
