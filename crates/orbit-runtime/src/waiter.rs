//! Per-transaction commit notifications.

use orbit_types::{BlockHeight, Hash, TimestampNano, TransactionReceipt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

/// What a released waiter learns about its transaction.
#[derive(Debug, Clone)]
pub struct CommittedNotification {
    /// The committed receipt.
    pub receipt: TransactionReceipt,
    /// Height it committed at.
    pub block_height: BlockHeight,
    /// Timestamp it committed at.
    pub block_timestamp: TimestampNano,
}

/// A registered transaction-results handler, invoked after each commit
/// with every newly-committed receipt.
pub type ResultsHandler =
    Box<dyn Fn(&[TransactionReceipt], BlockHeight, TimestampNano) + Send + Sync>;

/// Registry of waiters keyed by transaction hash, fed by the node loop's
/// commit notifications, plus the registered results handlers.
///
/// Backs the blocking send-transaction path and the
/// `wait_for_transaction_in_state` test surface. Waiting does not consult
/// the pool - callers check for an already-committed receipt first.
pub struct TransactionWaiter {
    waiters: Mutex<HashMap<Hash, Vec<oneshot::Sender<CommittedNotification>>>>,
    handlers: Mutex<Vec<ResultsHandler>>,
}

impl TransactionWaiter {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler invoked after each commit for every
    /// newly-committed transaction.
    pub fn register_results_handler(&self, handler: ResultsHandler) {
        self.handlers.lock().push(handler);
    }

    /// Release every waiter on the receipts of a committed block and
    /// invoke the registered results handlers.
    pub fn notify_committed(
        &self,
        receipts: &[TransactionReceipt],
        block_height: BlockHeight,
        block_timestamp: TimestampNano,
    ) {
        {
            let mut waiters = self.waiters.lock();
            for receipt in receipts {
                let Some(senders) = waiters.remove(&receipt.tx_hash) else {
                    continue;
                };
                for sender in senders {
                    let _ = sender.send(CommittedNotification {
                        receipt: receipt.clone(),
                        block_height,
                        block_timestamp,
                    });
                }
            }
        }

        for handler in self.handlers.lock().iter() {
            handler(receipts, block_height, block_timestamp);
        }
    }

    /// Wait until the transaction commits, up to `timeout`.
    ///
    /// `None` on timeout; the registration is cleaned up lazily when the
    /// commit eventually arrives or never.
    pub async fn wait_for_transaction_in_state(
        &self,
        tx_hash: Hash,
        timeout: Duration,
    ) -> Option<CommittedNotification> {
        let rx = {
            let (tx, rx) = oneshot::channel();
            self.waiters.lock().entry(tx_hash).or_default().push(tx);
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(notification)) => Some(notification),
            _ => None,
        }
    }
}

impl Default for TransactionWaiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::{Argument, ExecutionResult};
    use std::sync::Arc;

    fn receipt(seed: u8) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash: Hash::from_bytes(&[seed]),
            execution_result: ExecutionResult::Success,
            output_arguments: vec![Argument::Uint32(seed as u32)],
        }
    }

    #[tokio::test]
    async fn test_waiter_released_on_commit() {
        let waiter = Arc::new(TransactionWaiter::new());
        let r = receipt(1);

        let w = Arc::clone(&waiter);
        let hash = r.tx_hash;
        let waiting = tokio::spawn(async move {
            w.wait_for_transaction_in_state(hash, Duration::from_secs(5))
                .await
        });
        tokio::task::yield_now().await;

        waiter.notify_committed(&[r], BlockHeight(3), TimestampNano(30));

        let notification = waiting.await.unwrap().expect("waiter released");
        assert_eq!(notification.block_height, BlockHeight(3));
        assert_eq!(notification.receipt.tx_hash, hash);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let waiter = TransactionWaiter::new();
        let result = waiter
            .wait_for_transaction_in_state(Hash::from_bytes(b"never"), Duration::from_millis(20))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_results_handler_sees_every_commit() {
        let waiter = TransactionWaiter::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        waiter.register_results_handler(Box::new(move |receipts, height, _| {
            for r in receipts {
                log.lock().push((height, r.tx_hash));
            }
        }));

        waiter.notify_committed(&[receipt(1), receipt(2)], BlockHeight(4), TimestampNano(40));
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, BlockHeight(4));
    }

    #[tokio::test]
    async fn test_unrelated_commit_does_not_release() {
        let waiter = Arc::new(TransactionWaiter::new());

        let w = Arc::clone(&waiter);
        let waiting = tokio::spawn(async move {
            w.wait_for_transaction_in_state(Hash::from_bytes(b"mine"), Duration::from_millis(50))
                .await
        });
        tokio::task::yield_now().await;

        waiter.notify_committed(&[receipt(9)], BlockHeight(1), TimestampNano(1));
        assert!(waiting.await.unwrap().is_none());
    }
}
