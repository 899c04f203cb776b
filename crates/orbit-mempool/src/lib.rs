//! The transaction pool.
//!
//! Two sub-pools with disjoint ownership:
//!
//! - the **pending pool** holds validated transactions awaiting ordering,
//!   in insertion order, under a total-byte cap;
//! - the **committed pool** holds receipts of committed transactions until
//!   they age past the expiration window.
//!
//! [`MempoolState`] is the state machine tying them together: client
//! submission, peer relay ingress, ordering validation, the atomic commit
//! that moves transactions from pending to committed, and the expiry
//! sweepers.

mod committed;
mod config;
mod pending;
mod state;
mod validation;

pub use committed::{CommittedEntry, CommittedPool};
pub use config::MempoolConfig;
pub use pending::{PendingPool, PendingPoolError};
pub use state::{MempoolState, OrderingError, SubmitError, TransactionSubmission};
pub use validation::{TransactionRejected, ValidationContext};
