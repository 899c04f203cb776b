//! Client API messages served by the HTTP adapter.
//!
//! Bodies are framed binary: the canonical SBOR encoding of these types.
//! The human-readable status additionally travels in the `X-ORBS-CODE-NAME`
//! response header.

use orbit_types::{
    Argument, BlockHeight, ExecutionResult, Hash, RequestStatus, SignedTransaction, TimestampNano,
    Transaction, TransactionReceipt, TransactionStatus,
};
use sbor::prelude::BasicSbor;

/// `POST /api/v1/send-transaction` request body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct SendTransactionRequest {
    /// The signed transaction to submit.
    pub signed_transaction: SignedTransaction,
}

/// `POST /api/v1/send-transaction` response body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct SendTransactionResponse {
    /// Outcome of the request as a whole.
    pub request_status: RequestStatus,
    /// Canonical hash of the submitted transaction.
    pub tx_hash: Hash,
    /// Lifecycle status of the transaction.
    pub transaction_status: TransactionStatus,
    /// Receipt, present once committed.
    pub transaction_receipt: Option<TransactionReceipt>,
    /// Last committed height at response time.
    pub block_height: BlockHeight,
    /// Last committed timestamp at response time.
    pub block_timestamp: TimestampNano,
}

/// `POST /api/v1/call-method` request body: a read-only invocation.
///
/// Carries an unsigned transaction body; no signature is required for
/// read-only access.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CallMethodRequest {
    /// The call to run against committed state.
    pub transaction: Transaction,
}

/// `POST /api/v1/call-method` response body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct CallMethodResponse {
    /// Outcome of the request as a whole.
    pub request_status: RequestStatus,
    /// Output argument array produced by the method.
    pub output_arguments: Vec<Argument>,
    /// Execution outcome of the call.
    pub call_result: ExecutionResult,
    /// Height of the state the call ran against.
    pub block_height: BlockHeight,
}

/// `POST /api/v1/get-transaction-status` request body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct GetTransactionStatusRequest {
    /// Canonical transaction hash to look up.
    pub tx_hash: Hash,
}

/// `POST /api/v1/get-transaction-status` response body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
pub struct GetTransactionStatusResponse {
    /// Outcome of the request as a whole.
    pub request_status: RequestStatus,
    /// Lifecycle status of the transaction.
    pub transaction_status: TransactionStatus,
    /// Receipt, present once committed.
    pub transaction_receipt: Option<TransactionReceipt>,
    /// Last committed height at response time.
    pub block_height: BlockHeight,
    /// Last committed timestamp at response time.
    pub block_timestamp: TimestampNano,
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_types::test_utils::test_transaction;
    use sbor::prelude::*;

    #[test]
    fn test_send_transaction_roundtrip() {
        let req = SendTransactionRequest {
            signed_transaction: test_transaction(9),
        };
        let bytes = basic_encode(&req).unwrap();
        let decoded: SendTransactionRequest = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn test_response_with_receipt_roundtrip() {
        let tx = test_transaction(4);
        let resp = SendTransactionResponse {
            request_status: RequestStatus::Completed,
            tx_hash: tx.hash(),
            transaction_status: TransactionStatus::Committed,
            transaction_receipt: Some(TransactionReceipt {
                tx_hash: tx.hash(),
                execution_result: ExecutionResult::Success,
                output_arguments: vec![Argument::Uint64(117)],
            }),
            block_height: BlockHeight(12),
            block_timestamp: TimestampNano(99),
        };
        let bytes = basic_encode(&resp).unwrap();
        let decoded: SendTransactionResponse = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(resp, decoded);
    }
}
