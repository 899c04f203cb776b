//! Per-transaction validation.

use orbit_types::{
    ProtocolVersion, SignedTransaction, TimestampNano, VirtualChainId,
};
use std::time::Duration;
use thiserror::Error;

/// Why a transaction failed validation. Rejected transactions are never
/// relayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionRejected {
    /// Structurally unusable: empty contract or method name.
    #[error("transaction content is corrupt")]
    CorruptContent,

    /// The signer targeted a different protocol version.
    #[error("protocol version mismatch: ours {ours:?}, transaction {theirs:?}")]
    ProtocolVersionMismatch {
        /// Our protocol version.
        ours: ProtocolVersion,
        /// The transaction's.
        theirs: ProtocolVersion,
    },

    /// The transaction belongs to a different virtual chain.
    #[error("virtual chain mismatch: ours {ours:?}, transaction {theirs:?}")]
    VirtualChainMismatch {
        /// Our chain id.
        ours: VirtualChainId,
        /// The transaction's.
        theirs: VirtualChainId,
    },

    /// The timestamp fell out of the acceptance window on the old side.
    #[error("transaction expired: timestamp {timestamp}, window floor {floor}")]
    Expired {
        /// The transaction's timestamp.
        timestamp: TimestampNano,
        /// Oldest acceptable timestamp.
        floor: TimestampNano,
    },

    /// The timestamp points too far into the future.
    #[error("transaction timestamp in the future: {timestamp}, ceiling {ceiling}")]
    TimestampAhead {
        /// The transaction's timestamp.
        timestamp: TimestampNano,
        /// Newest acceptable timestamp.
        ceiling: TimestampNano,
    },

    /// The envelope signature does not verify against the signer key.
    #[error("invalid signature")]
    InvalidSignature,

    /// A receipt already exists for this hash.
    #[error("transaction already committed")]
    AlreadyCommitted,
}

/// The context a transaction is validated against: node identity plus the
/// committed-chain clock.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Our protocol version.
    pub protocol_version: ProtocolVersion,
    /// Our virtual chain.
    pub virtual_chain_id: VirtualChainId,
    /// Expiry window below the last committed block's timestamp.
    pub expiry_window: Duration,
    /// Grace above our current clock.
    pub future_timestamp_grace: Duration,
    /// Timestamp of the last committed block.
    pub last_committed_block_timestamp: TimestampNano,
    /// Our current clock.
    pub now: TimestampNano,
}

impl ValidationContext {
    /// Run the per-transaction checks, in order: structure, protocol
    /// version, virtual chain, timestamp window, signature.
    pub fn validate_transaction(&self, tx: &SignedTransaction) -> Result<(), TransactionRejected> {
        let body = &tx.transaction;

        if body.contract_name.is_empty() || body.method_name.is_empty() {
            return Err(TransactionRejected::CorruptContent);
        }

        if body.protocol_version != self.protocol_version {
            return Err(TransactionRejected::ProtocolVersionMismatch {
                ours: self.protocol_version,
                theirs: body.protocol_version,
            });
        }

        if body.virtual_chain_id != self.virtual_chain_id {
            return Err(TransactionRejected::VirtualChainMismatch {
                ours: self.virtual_chain_id,
                theirs: body.virtual_chain_id,
            });
        }

        let floor = self
            .last_committed_block_timestamp
            .saturating_sub(self.expiry_window);
        if body.timestamp < floor {
            return Err(TransactionRejected::Expired {
                timestamp: body.timestamp,
                floor,
            });
        }

        let ceiling = self.now.saturating_add(self.future_timestamp_grace);
        if body.timestamp > ceiling {
            return Err(TransactionRejected::TimestampAhead {
                timestamp: body.timestamp,
                ceiling,
            });
        }

        tx.verify_signature()
            .map_err(|_| TransactionRejected::InvalidSignature)?;

        Ok(())
    }
}
