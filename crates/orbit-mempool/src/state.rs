//! The transaction pool state machine.

use crate::committed::CommittedPool;
use crate::config::MempoolConfig;
use crate::pending::{PendingPool, PendingPoolError};
use crate::validation::{TransactionRejected, ValidationContext};
use orbit_core::{Action, OutboundMessage, TimerId};
use orbit_messages::ForwardedTransactions;
use orbit_metrics as metrics;
use orbit_types::{
    BlockHeight, Hash, SignedTransaction, TimestampNano, TransactionReceipt, TransactionStatus,
    ValidatorId, VirtualChainId, PROTOCOL_VERSION,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Snapshot returned for submission and receipt lookups.
#[derive(Debug, Clone)]
pub struct TransactionSubmission {
    /// Lifecycle status of the transaction.
    pub status: TransactionStatus,
    /// Receipt, present when `status` is `Committed`.
    pub receipt: Option<TransactionReceipt>,
    /// Last committed height at the time of the answer.
    pub block_height: BlockHeight,
    /// Last committed timestamp at the time of the answer.
    pub block_timestamp: TimestampNano,
}

/// Why a submission did not enter the pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Validation failed; the transaction was not relayed.
    #[error(transparent)]
    Rejected(#[from] TransactionRejected),

    /// The pending pool byte cap is reached.
    #[error("pending pool congestion")]
    Congestion,
}

/// Why a proposed ordering failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// The pool has not yet observed the predecessor height.
    #[error("pool at height {have}, ordering requires {want}")]
    NotYetSynced {
        /// Height the ordering requires the pool to have observed.
        want: BlockHeight,
        /// Height the pool has observed.
        have: BlockHeight,
    },

    /// A transaction in the set already committed.
    #[error("transaction {0} already committed")]
    AlreadyCommitted(Hash),

    /// A transaction in the set fails validation.
    #[error("transaction {hash} is invalid: {source}")]
    Invalid {
        /// The failing transaction.
        hash: Hash,
        /// The validation failure.
        #[source]
        source: TransactionRejected,
    },
}

/// The transaction pool: pending + committed sub-pools with validation,
/// relay, expiry, and the committed-chain clock.
pub struct MempoolState {
    config: MempoolConfig,
    local_id: ValidatorId,
    virtual_chain_id: VirtualChainId,

    pending: PendingPool,
    committed: CommittedPool,

    last_committed_height: BlockHeight,
    last_committed_timestamp: TimestampNano,

    now: Duration,
}

impl MempoolState {
    /// Create the pool.
    ///
    /// `initial_timestamp` seeds the committed-chain clock so transactions
    /// are not rejected at startup, before any block has been committed.
    pub fn new(
        local_id: ValidatorId,
        virtual_chain_id: VirtualChainId,
        config: MempoolConfig,
        initial_timestamp: TimestampNano,
    ) -> Self {
        let pending = PendingPool::new(config.pending_pool_size_bytes);
        Self {
            config,
            local_id,
            virtual_chain_id,
            pending,
            committed: CommittedPool::new(),
            last_committed_height: BlockHeight(0),
            last_committed_timestamp: initial_timestamp,
            now: Duration::ZERO,
        }
    }

    /// Set the current time. Called by the owner before each event.
    pub fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    /// Arm both sweeper timers. Called once at startup.
    pub fn startup_actions(&self) -> Vec<Action> {
        vec![
            Action::SetTimer {
                id: TimerId::PendingSweep,
                duration: self.config.pending_sweep_interval,
            },
            Action::SetTimer {
                id: TimerId::CommittedSweep,
                duration: self.config.committed_sweep_interval,
            },
        ]
    }

    fn validation_context(&self) -> ValidationContext {
        ValidationContext {
            protocol_version: PROTOCOL_VERSION,
            virtual_chain_id: self.virtual_chain_id,
            expiry_window: self.config.expiration_window,
            future_timestamp_grace: self.config.future_timestamp_grace,
            last_committed_block_timestamp: self.last_committed_timestamp,
            now: TimestampNano::from_duration(self.now),
        }
    }

    fn submission(
        &self,
        status: TransactionStatus,
        receipt: Option<TransactionReceipt>,
    ) -> TransactionSubmission {
        TransactionSubmission {
            status,
            receipt,
            block_height: self.last_committed_height,
            block_timestamp: self.last_committed_timestamp,
        }
    }

    /// Height the pool has observed committed.
    pub fn last_committed_height(&self) -> BlockHeight {
        self.last_committed_height
    }

    /// Timestamp of the last committed block the pool observed.
    pub fn last_committed_timestamp(&self) -> TimestampNano {
        self.last_committed_timestamp
    }

    /// Whether any transactions await ordering.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of pending transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Pending transactions in insertion order, for block assembly.
    pub fn get_transactions_for_ordering(
        &mut self,
        max_count: usize,
        max_bytes: usize,
    ) -> Vec<SignedTransaction> {
        self.pending.get_batch(max_count, max_bytes)
    }

    /// Client submission (`AddNewTransaction`).
    ///
    /// A committed duplicate answers with its stored receipt. A pending
    /// duplicate answers `Pending` without a second relay. A fresh valid
    /// transaction enters the pending pool and is forwarded to peers once.
    #[instrument(skip(self, tx), fields(tx_hash = %tx.hash()))]
    pub fn on_submit_transaction(
        &mut self,
        tx: SignedTransaction,
    ) -> Result<(TransactionSubmission, Vec<Action>), SubmitError> {
        let hash = tx.hash();

        if let Some(entry) = self.committed.get(&hash) {
            return Ok((
                self.submission(TransactionStatus::Committed, Some(entry.receipt.clone())),
                vec![],
            ));
        }

        if self.pending.contains(&hash) {
            return Ok((self.submission(TransactionStatus::Pending, None), vec![]));
        }

        if let Err(rejection) = self.validation_context().validate_transaction(&tx) {
            metrics::record_transaction_rejected("validation");
            debug!(error = %rejection, "rejecting submitted transaction");
            return Err(SubmitError::Rejected(rejection));
        }

        let size = tx.size_bytes();
        match self.pending.add(tx.clone(), self.now, None) {
            Ok(_) => {}
            Err(PendingPoolError::Duplicate(_)) => {
                return Ok((self.submission(TransactionStatus::Pending, None), vec![]));
            }
            Err(PendingPoolError::Congestion { used, cap }) => {
                metrics::record_transaction_rejected("congestion");
                warn!(used, cap, "pending pool congestion");
                return Err(SubmitError::Congestion);
            }
        }

        metrics::record_transaction_added(size);
        metrics::set_pending_pool_size(self.pending.len(), self.pending.total_bytes());
        info!(pool_size = self.pending.len(), "transaction added to pending pool");

        let relay = Action::Broadcast {
            message: OutboundMessage::ForwardedTransactions(ForwardedTransactions {
                sender: self.local_id,
                transactions: vec![tx],
            }),
        };
        Ok((self.submission(TransactionStatus::Pending, None), vec![relay]))
    }

    /// Peer relay ingress (`HandleForwardedTransactions`).
    ///
    /// Every included transaction is inserted with the batch's sender as
    /// its relay source; duplicates are ignored and individual failures
    /// are logged and dropped.
    #[instrument(skip(self, message), fields(sender = %message.sender, count = message.transactions.len()))]
    pub fn on_forwarded_transactions(&mut self, message: ForwardedTransactions) -> Vec<Action> {
        for tx in message.transactions {
            let hash = tx.hash();
            if self.committed.has(&hash) || self.pending.contains(&hash) {
                continue;
            }
            if let Err(e) = self.pending.add(tx, self.now, Some(message.sender)) {
                debug!(%hash, error = %e, "dropping forwarded transaction");
            }
        }
        metrics::set_pending_pool_size(self.pending.len(), self.pending.total_bytes());
        vec![]
    }

    /// Receipt lookup (`GetCommittedTransactionReceipt`).
    pub fn get_committed_receipt(&self, hash: &Hash) -> TransactionSubmission {
        if self.pending.contains(hash) {
            return self.submission(TransactionStatus::Pending, None);
        }
        if let Some(entry) = self.committed.get(hash) {
            return self.submission(TransactionStatus::Committed, Some(entry.receipt.clone()));
        }
        self.submission(TransactionStatus::NoRecord, None)
    }

    /// Validate a proposed ordering (`ValidateTransactionsForOrdering`).
    ///
    /// The pool must have observed `height - 1`; callers that can wait do
    /// so outside (the proposal buffer, or the runtime block tracker) and
    /// retry. Each transaction must be uncommitted and pass the current
    /// validation context. The VM pre-order pass is sequenced after this
    /// by the caller.
    pub fn validate_for_ordering(
        &self,
        height: BlockHeight,
        transactions: &[SignedTransaction],
    ) -> Result<(), OrderingError> {
        let want = height.prev();
        if self.last_committed_height < want {
            return Err(OrderingError::NotYetSynced {
                want,
                have: self.last_committed_height,
            });
        }

        let vctx = self.validation_context();
        for tx in transactions {
            let hash = tx.hash();
            if self.committed.has(&hash) {
                return Err(OrderingError::AlreadyCommitted(hash));
            }
            vctx.validate_transaction(tx)
                .map_err(|source| OrderingError::Invalid { hash, source })?;
        }
        Ok(())
    }

    /// Atomic commit (`CommitTransactionReceipts`).
    ///
    /// Moves each receipt out of pending into committed, advances the
    /// committed-chain clock, and notifies result handlers. Re-commits at
    /// or below the observed height are idempotently ignored.
    #[instrument(skip(self, receipts), fields(height = height.0, count = receipts.len()))]
    pub fn commit_transaction_receipts(
        &mut self,
        height: BlockHeight,
        timestamp: TimestampNano,
        receipts: Vec<TransactionReceipt>,
    ) -> Vec<Action> {
        if height <= self.last_committed_height {
            debug!(
                observed = self.last_committed_height.0,
                "ignoring duplicate commit"
            );
            return vec![];
        }

        for receipt in &receipts {
            self.pending.remove(&receipt.tx_hash);
            self.committed
                .add(receipt.clone(), height, timestamp, self.now);
        }

        self.last_committed_height = height;
        self.last_committed_timestamp = timestamp;
        metrics::set_pending_pool_size(self.pending.len(), self.pending.total_bytes());

        if receipts.is_empty() {
            return vec![];
        }
        vec![Action::NotifyTransactionResults {
            receipts,
            block_height: height,
            block_timestamp: timestamp,
        }]
    }

    /// Pending pool sweeper tick.
    pub fn on_pending_sweep(&mut self) -> Vec<Action> {
        let cutoff = self.now.saturating_sub(self.config.expiration_window);
        let swept = self.pending.clear_transactions_older_than(cutoff);
        if swept > 0 {
            metrics::record_pending_expired(swept);
            info!(swept, "expired pending transactions");
        }
        vec![Action::SetTimer {
            id: TimerId::PendingSweep,
            duration: self.config.pending_sweep_interval,
        }]
    }

    /// Committed pool sweeper tick.
    pub fn on_committed_sweep(&mut self) -> Vec<Action> {
        let cutoff = self.now.saturating_sub(self.config.expiration_window);
        let swept = self.committed.clear_transactions_older_than(cutoff);
        if swept > 0 {
            metrics::record_committed_expired(swept);
            info!(swept, "expired committed receipts");
        }
        vec![Action::SetTimer {
            id: TimerId::CommittedSweep,
            duration: self.config.committed_sweep_interval,
        }]
    }
}
