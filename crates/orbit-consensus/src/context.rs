//! The consensus context: candidate block pair assembly and validation.
//!
//! Builders and validators run the same construction; a validator accepts a
//! proposed block iff every computed field matches the proposal bit-exactly.

use orbit_engine::VirtualMachine;
use orbit_mempool::{MempoolState, OrderingError};
use orbit_types::{
    compute_receipts_root, compute_state_diff_hash, compute_transactions_root, BlockHeight,
    BlockPair, BlockPairError, Hash, PreOrderStatus, ResultsBlock, ResultsBlockHeader,
    SignedTransaction, TimestampNano, TransactionsBlock, TransactionsBlockHeader, VirtualChainId,
    PROTOCOL_VERSION,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

/// Why a proposed block failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockValidationError {
    /// The pair's internal invariants do not hold.
    #[error(transparent)]
    PairInconsistent(#[from] BlockPairError),

    /// Header carries a different protocol version or chain id.
    #[error("wrong protocol version or virtual chain id")]
    WrongChain,

    /// Header height does not extend the local chain.
    #[error("wrong height: proposed {proposed}, expected {expected}")]
    WrongHeight {
        /// Proposed height.
        proposed: BlockHeight,
        /// The only acceptable height.
        expected: BlockHeight,
    },

    /// Header does not link to our predecessor.
    #[error("prev block hash mismatch")]
    PrevHashMismatch,

    /// Header timestamp does not strictly increase.
    #[error("timestamp not strictly increasing: proposed {proposed}, prev {prev}")]
    NonMonotonicTimestamp {
        /// Proposed timestamp.
        proposed: TimestampNano,
        /// Predecessor timestamp.
        prev: TimestampNano,
    },

    /// A recomputed transactions-block field disagrees.
    #[error("transactions block field mismatch: {0}")]
    TransactionsBlockMismatch(&'static str),

    /// The pool refused the proposed ordering.
    #[error(transparent)]
    Ordering(#[from] OrderingError),

    /// A transaction failed the pre-order gate.
    #[error("transaction {hash} failed pre-order with {status:?}")]
    PreOrderRejected {
        /// The failing transaction.
        hash: Hash,
        /// Its verdict.
        status: PreOrderStatus,
    },

    /// A recomputed results-block field disagrees.
    #[error("results block field mismatch: {0}")]
    ResultsBlockMismatch(&'static str),
}

/// Builds the next candidate block pair and mirror-validates proposals.
pub struct ConsensusContext {
    vm: Arc<VirtualMachine>,
    virtual_chain_id: VirtualChainId,
}

impl ConsensusContext {
    /// Create a context over the node's VM.
    pub fn new(vm: Arc<VirtualMachine>, virtual_chain_id: VirtualChainId) -> Self {
        Self {
            vm,
            virtual_chain_id,
        }
    }

    /// Assemble the transactions block (`RequestNewTransactionsBlock`).
    ///
    /// The header timestamp is `max(now, prev + 1)`: strictly monotonic
    /// even under clock regressions.
    #[instrument(skip(self, transactions), fields(height = height.0, count = transactions.len()))]
    pub fn build_transactions_block(
        &self,
        height: BlockHeight,
        prev_block_hash: Hash,
        prev_timestamp: TimestampNano,
        transactions: Vec<SignedTransaction>,
        now: TimestampNano,
    ) -> TransactionsBlock {
        let timestamp = TimestampNano(now.0.max(prev_timestamp.0 + 1));
        let block = TransactionsBlock {
            header: TransactionsBlockHeader {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: self.virtual_chain_id,
                height,
                prev_block_hash,
                timestamp,
                tx_merkle_root: compute_transactions_root(&transactions),
                num_transactions: transactions.len() as u32,
            },
            transactions,
        };
        info!(
            num_transactions = block.header.num_transactions,
            "created transactions block"
        );
        block
    }

    /// Assemble the results block (`RequestNewResultsBlock`).
    ///
    /// Runs the transaction set through the VM and stamps the pair link
    /// `transactions_block_hash = hash(tx_block)`.
    #[instrument(skip(self, transactions_block), fields(height = transactions_block.header.height.0))]
    pub fn build_results_block(&self, transactions_block: &TransactionsBlock) -> ResultsBlock {
        let header = &transactions_block.header;
        let result = self
            .vm
            .process_transaction_set(header.height, &transactions_block.transactions);

        ResultsBlock {
            header: ResultsBlockHeader {
                protocol_version: PROTOCOL_VERSION,
                virtual_chain_id: self.virtual_chain_id,
                height: header.height,
                prev_block_hash: header.prev_block_hash,
                timestamp: header.timestamp,
                transactions_block_hash: transactions_block.hash(),
                receipts_merkle_root: compute_receipts_root(&result.receipts),
                state_diff_hash: compute_state_diff_hash(&result.state_diffs),
                num_receipts: result.receipts.len() as u32,
            },
            receipts: result.receipts,
            state_diffs: result.state_diffs,
        }
    }

    /// Build a complete candidate pair.
    pub fn build_block_pair(
        &self,
        height: BlockHeight,
        prev_block_hash: Hash,
        prev_timestamp: TimestampNano,
        transactions: Vec<SignedTransaction>,
        now: TimestampNano,
    ) -> BlockPair {
        let transactions_block = self.build_transactions_block(
            height,
            prev_block_hash,
            prev_timestamp,
            transactions,
            now,
        );
        let results_block = self.build_results_block(&transactions_block);
        BlockPair {
            transactions_block,
            results_block,
        }
    }

    /// Validate a proposed transactions block (`ValidateTransactionsBlock`).
    ///
    /// Mirrors the construction: header fields are recomputed and compared
    /// bit-exactly; the transaction set must pass the pool's ordering
    /// validation and the VM pre-order gate.
    pub fn validate_transactions_block(
        &self,
        block: &TransactionsBlock,
        expected_height: BlockHeight,
        prev_block_hash: Hash,
        prev_timestamp: TimestampNano,
        pool: &MempoolState,
    ) -> Result<(), BlockValidationError> {
        let header = &block.header;

        if header.protocol_version != PROTOCOL_VERSION
            || header.virtual_chain_id != self.virtual_chain_id
        {
            return Err(BlockValidationError::WrongChain);
        }
        if header.height != expected_height {
            return Err(BlockValidationError::WrongHeight {
                proposed: header.height,
                expected: expected_height,
            });
        }
        if header.prev_block_hash != prev_block_hash {
            return Err(BlockValidationError::PrevHashMismatch);
        }
        if header.timestamp <= prev_timestamp {
            return Err(BlockValidationError::NonMonotonicTimestamp {
                proposed: header.timestamp,
                prev: prev_timestamp,
            });
        }
        if header.tx_merkle_root != compute_transactions_root(&block.transactions) {
            return Err(BlockValidationError::TransactionsBlockMismatch("tx_merkle_root"));
        }
        if header.num_transactions as usize != block.transactions.len() {
            return Err(BlockValidationError::TransactionsBlockMismatch("num_transactions"));
        }

        pool.validate_for_ordering(header.height, &block.transactions)?;

        let verdicts = self
            .vm
            .transaction_set_pre_order(header.height, &block.transactions);
        for (tx, status) in block.transactions.iter().zip(verdicts) {
            if status != PreOrderStatus::Valid {
                return Err(BlockValidationError::PreOrderRejected {
                    hash: tx.hash(),
                    status,
                });
            }
        }

        Ok(())
    }

    /// Validate a proposed results block (`ValidateResultsBlock`).
    ///
    /// Re-executes the transaction set and accepts iff every computed
    /// field, receipt, and state diff matches the proposal bit-exactly.
    pub fn validate_results_block(
        &self,
        transactions_block: &TransactionsBlock,
        results_block: &ResultsBlock,
    ) -> Result<(), BlockValidationError> {
        let expected = self.build_results_block(transactions_block);

        if results_block.header.transactions_block_hash
            != expected.header.transactions_block_hash
        {
            return Err(BlockValidationError::ResultsBlockMismatch("transactions_block_hash"));
        }
        if results_block.header.receipts_merkle_root != expected.header.receipts_merkle_root {
            return Err(BlockValidationError::ResultsBlockMismatch("receipts_merkle_root"));
        }
        if results_block.header.state_diff_hash != expected.header.state_diff_hash {
            return Err(BlockValidationError::ResultsBlockMismatch("state_diff_hash"));
        }
        if results_block.header != expected.header {
            return Err(BlockValidationError::ResultsBlockMismatch("header"));
        }
        if results_block.receipts != expected.receipts {
            return Err(BlockValidationError::ResultsBlockMismatch("receipts"));
        }
        if results_block.state_diffs != expected.state_diffs {
            return Err(BlockValidationError::ResultsBlockMismatch("state_diffs"));
        }

        Ok(())
    }
}
