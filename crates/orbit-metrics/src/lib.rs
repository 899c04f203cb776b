//! Metrics facade for Orbit.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. A global singleton recorder is accessed via
//! [`recorder()`], and convenience free functions delegate to it.
//!
//! Callers record metrics via the free functions:
//! ```ignore
//! orbit_metrics::record_transaction_added(size_bytes);
//! orbit_metrics::record_block_committed(height, tx_count);
//! ```
//!
//! At startup a backend may be installed with [`install`]; without one, the
//! built-in no-op recorder is used.

use std::sync::OnceLock;

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need to
/// override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    // ── Transaction pool ─────────────────────────────────────────────

    /// A transaction entered the pending pool.
    fn record_transaction_added(&self, size_bytes: usize) {}

    /// A transaction was rejected before entering the pool.
    fn record_transaction_rejected(&self, reason: &str) {}

    /// Pending entries swept by the expiry sweeper.
    fn record_pending_expired(&self, count: usize) {}

    /// Committed receipts swept by the expiry sweeper.
    fn record_committed_expired(&self, count: usize) {}

    /// Set the pending pool size gauges.
    fn set_pending_pool_size(&self, count: usize, bytes: usize) {}

    // ── Consensus ────────────────────────────────────────────────────

    /// A block pair was committed.
    fn record_block_committed(&self, height: u64, tx_count: usize) {}

    /// A proposal was rejected during validation.
    fn record_proposal_rejected(&self, reason: &str) {}

    /// Set the committed height gauge.
    fn set_block_height(&self, height: u64) {}

    // ── Block sync ───────────────────────────────────────────────────

    /// A sync round started.
    fn record_sync_round_started(&self) {}

    /// A synced chunk was applied.
    fn record_sync_blocks_applied(&self, count: usize) {}

    /// A sync response was discarded.
    fn record_sync_response_error(&self, reason: &str) {}
}

/// Built-in no-op recorder.
struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();

/// Install a metrics backend. May be called at most once; later calls are
/// ignored.
pub fn install(recorder: Box<dyn MetricsRecorder>) {
    let _ = RECORDER.set(recorder);
}

/// The active recorder (no-op unless a backend was installed).
pub fn recorder() -> &'static dyn MetricsRecorder {
    RECORDER
        .get()
        .map(|b| b.as_ref())
        .unwrap_or(&NoopRecorder)
}

// ── Free functions ───────────────────────────────────────────────────

/// A transaction entered the pending pool.
pub fn record_transaction_added(size_bytes: usize) {
    recorder().record_transaction_added(size_bytes);
}

/// A transaction was rejected before entering the pool.
pub fn record_transaction_rejected(reason: &str) {
    recorder().record_transaction_rejected(reason);
}

/// Pending entries swept by the expiry sweeper.
pub fn record_pending_expired(count: usize) {
    recorder().record_pending_expired(count);
}

/// Committed receipts swept by the expiry sweeper.
pub fn record_committed_expired(count: usize) {
    recorder().record_committed_expired(count);
}

/// Set the pending pool size gauges.
pub fn set_pending_pool_size(count: usize, bytes: usize) {
    recorder().set_pending_pool_size(count, bytes);
}

/// A block pair was committed.
pub fn record_block_committed(height: u64, tx_count: usize) {
    recorder().record_block_committed(height, tx_count);
}

/// A proposal was rejected during validation.
pub fn record_proposal_rejected(reason: &str) {
    recorder().record_proposal_rejected(reason);
}

/// Set the committed height gauge.
pub fn set_block_height(height: u64) {
    recorder().set_block_height(height);
}

/// A sync round started.
pub fn record_sync_round_started() {
    recorder().record_sync_round_started();
}

/// A synced chunk was applied.
pub fn record_sync_blocks_applied(count: usize) {
    recorder().record_sync_blocks_applied(count);
}

/// A sync response was discarded.
pub fn record_sync_response_error(reason: &str) {
    recorder().record_sync_response_error(reason);
}
