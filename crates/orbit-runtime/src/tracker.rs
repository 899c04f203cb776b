//! The block tracker: bounded wait-for-height.

use orbit_types::BlockHeight;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Tracker bounds.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Waiting is refused outright for heights further ahead than this.
    pub grace_block_distance: u64,
    /// How long a waiter may block before timing out.
    pub grace_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            grace_block_distance: 5,
            grace_timeout: Duration::from_millis(100),
        }
    }
}

/// Why a wait did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The requested height is beyond the grace distance; fail fast rather
    /// than wait.
    #[error("height {requested} too far ahead of {latest} (grace {grace})")]
    TooFarAhead {
        /// The height asked for.
        requested: BlockHeight,
        /// The latest height observed.
        latest: BlockHeight,
        /// The configured grace distance.
        grace: u64,
    },

    /// The grace timeout elapsed before the height was observed.
    #[error("timed out waiting for height {requested} at {latest}")]
    Timeout {
        /// The height asked for.
        requested: BlockHeight,
        /// The latest height observed when the timeout fired.
        latest: BlockHeight,
    },

    /// The node is shutting down; the publishing side is gone.
    #[error("tracker closed")]
    Closed,
}

/// Publishing side, owned by the node loop.
pub struct BlockTrackerHandle {
    tx: watch::Sender<u64>,
}

impl BlockTrackerHandle {
    /// Advance the latest-known height. Regressions are ignored.
    pub fn advance(&self, height: BlockHeight) {
        self.tx.send_if_modified(|latest| {
            if height.0 > *latest {
                *latest = height.0;
                true
            } else {
                false
            }
        });
    }
}

/// A synchronization primitive over the committed height.
///
/// `wait_for_block(h)` returns immediately once the latest known height
/// reaches `h`; otherwise it waits - bounded by the grace timeout - for
/// commits to advance. Heights more than the grace distance ahead fail
/// fast.
#[derive(Clone)]
pub struct BlockTracker {
    rx: watch::Receiver<u64>,
    config: TrackerConfig,
}

impl BlockTracker {
    /// Create a tracker/handle pair starting at `initial`.
    pub fn new(initial: BlockHeight, config: TrackerConfig) -> (BlockTrackerHandle, Self) {
        let (tx, rx) = watch::channel(initial.0);
        (BlockTrackerHandle { tx }, Self { rx, config })
    }

    /// The latest height observed.
    pub fn latest(&self) -> BlockHeight {
        BlockHeight(*self.rx.borrow())
    }

    /// Wait until the latest known height reaches `height`.
    pub async fn wait_for_block(&self, height: BlockHeight) -> Result<(), TrackerError> {
        let mut rx = self.rx.clone();

        let latest = BlockHeight(*rx.borrow());
        if latest >= height {
            return Ok(());
        }
        if height.0 > latest.0 + self.config.grace_block_distance {
            return Err(TrackerError::TooFarAhead {
                requested: height,
                latest,
                grace: self.config.grace_block_distance,
            });
        }

        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(TrackerError::Closed);
                }
                if *rx.borrow() >= height.0 {
                    return Ok(());
                }
            }
        };

        match tokio::time::timeout(self.config.grace_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(TrackerError::Timeout {
                requested: height,
                latest: self.latest(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(initial: u64) -> (BlockTrackerHandle, BlockTracker) {
        BlockTracker::new(
            BlockHeight(initial),
            TrackerConfig {
                grace_block_distance: 5,
                grace_timeout: Duration::from_millis(200),
            },
        )
    }

    #[tokio::test]
    async fn test_returns_immediately_when_reached() {
        let (_handle, tracker) = tracker(10);
        assert!(tracker.wait_for_block(BlockHeight(10)).await.is_ok());
        assert!(tracker.wait_for_block(BlockHeight(3)).await.is_ok());
    }

    #[tokio::test]
    async fn test_fails_fast_beyond_grace_distance() {
        let (_handle, tracker) = tracker(10);
        assert!(matches!(
            tracker.wait_for_block(BlockHeight(16)).await,
            Err(TrackerError::TooFarAhead { .. })
        ));
    }

    #[tokio::test]
    async fn test_released_when_height_advances() {
        let (handle, tracker) = tracker(10);

        let waiter = tokio::spawn(async move { tracker.wait_for_block(BlockHeight(12)).await });
        tokio::task::yield_now().await;

        handle.advance(BlockHeight(11));
        handle.advance(BlockHeight(12));

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_all_waiters_at_or_below_released() {
        let (handle, tracker) = tracker(0);

        let mut waiters = Vec::new();
        for h in 1..=3u64 {
            let t = tracker.clone();
            waiters.push(tokio::spawn(
                async move { t.wait_for_block(BlockHeight(h)).await },
            ));
        }
        tokio::task::yield_now().await;

        handle.advance(BlockHeight(3));
        for waiter in waiters {
            assert!(waiter.await.unwrap().is_ok());
        }
    }

    #[tokio::test]
    async fn test_times_out_when_chain_stalls() {
        let (_handle, tracker) = tracker(10);
        assert!(matches!(
            tracker.wait_for_block(BlockHeight(11)).await,
            Err(TrackerError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_regression_ignored() {
        let (handle, tracker) = tracker(10);
        handle.advance(BlockHeight(5));
        assert_eq!(tracker.latest(), BlockHeight(10));
    }
}
