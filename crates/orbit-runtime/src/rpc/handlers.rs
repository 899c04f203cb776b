//! Request handlers and response framing.

use crate::node_loop::LoopHandle;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use orbit_messages::{
    CallMethodRequest, CallMethodResponse, GetTransactionStatusRequest,
    GetTransactionStatusResponse, SendTransactionRequest, SendTransactionResponse,
};
use orbit_types::{RequestStatus, TransactionStatus};
use sbor::prelude::{basic_encode, BasicEncode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Content type of the framed binary bodies.
pub const CONTENT_TYPE: &str = "application/vnd.membuffers";

/// Response header carrying the human-readable status.
pub const STATUS_HEADER: &str = "X-ORBS-CODE-NAME";

/// Shared handler state.
#[derive(Clone)]
pub struct RpcState {
    /// The node loop.
    pub handle: Arc<LoopHandle>,
    /// How long send-transaction blocks for a commit before answering
    /// IN_PROCESS.
    pub send_timeout: Duration,
}

/// Map a request status onto its HTTP code.
pub fn http_code_for(status: RequestStatus) -> StatusCode {
    match status {
        RequestStatus::Completed => StatusCode::OK,
        RequestStatus::InProcess => StatusCode::ACCEPTED,
        RequestStatus::NotFound => StatusCode::NOT_FOUND,
        RequestStatus::Rejected => StatusCode::BAD_REQUEST,
        RequestStatus::Congestion => StatusCode::SERVICE_UNAVAILABLE,
        RequestStatus::Reserved => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn framed_response<M: BasicEncode>(message: &M, status: RequestStatus, code_name: String) -> Response {
    let bytes = basic_encode(message).unwrap_or_default();
    Response::builder()
        .status(http_code_for(status))
        .header("Content-Type", CONTENT_TYPE)
        .header(STATUS_HEADER, code_name)
        .body(Body::from(bytes))
        .expect("static response construction")
}

fn malformed_request() -> Response {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "text/plain")
        .body(Body::from("http request is not a valid message"))
        .expect("static response construction")
}

fn unavailable() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("Content-Type", "text/plain")
        .body(Body::from("node is shutting down"))
        .expect("static response construction")
}

/// `POST /api/v1/send-transaction`.
///
/// Blocks on the transaction waiter up to the configured timeout; a commit
/// within the window answers COMPLETED with the receipt, otherwise the
/// accepted transaction reports IN_PROCESS.
pub async fn send_transaction_handler(State(state): State<RpcState>, body: Bytes) -> Response {
    let Ok(request) = sbor::basic_decode::<SendTransactionRequest>(&body) else {
        return malformed_request();
    };
    let tx = request.signed_transaction;
    let tx_hash = tx.hash();
    debug!(%tx_hash, "http send-transaction");

    let submission = match state.handle.submit_transaction(tx).await {
        Ok(submission) => submission,
        Err(orbit_mempool::SubmitError::Rejected(_)) => {
            let response = SendTransactionResponse {
                request_status: RequestStatus::Rejected,
                tx_hash,
                transaction_status: TransactionStatus::Rejected,
                transaction_receipt: None,
                block_height: Default::default(),
                block_timestamp: Default::default(),
            };
            return framed_response(
                &response,
                RequestStatus::Rejected,
                TransactionStatus::Rejected.to_string(),
            );
        }
        Err(orbit_mempool::SubmitError::Congestion) => {
            let response = SendTransactionResponse {
                request_status: RequestStatus::Congestion,
                tx_hash,
                transaction_status: TransactionStatus::Rejected,
                transaction_receipt: None,
                block_height: Default::default(),
                block_timestamp: Default::default(),
            };
            return framed_response(
                &response,
                RequestStatus::Congestion,
                RequestStatus::Congestion.to_string(),
            );
        }
    };

    // Already committed (duplicate submission): answer right away.
    if submission.status == TransactionStatus::Committed {
        let response = SendTransactionResponse {
            request_status: RequestStatus::Completed,
            tx_hash,
            transaction_status: TransactionStatus::Committed,
            transaction_receipt: submission.receipt,
            block_height: submission.block_height,
            block_timestamp: submission.block_timestamp,
        };
        return framed_response(
            &response,
            RequestStatus::Completed,
            TransactionStatus::Committed.to_string(),
        );
    }

    // Pending: wait for the commit, then re-check once to close the race
    // between the pool answer and the waiter registration.
    if let Some(notification) = state
        .handle
        .waiter()
        .wait_for_transaction_in_state(tx_hash, state.send_timeout)
        .await
    {
        let response = SendTransactionResponse {
            request_status: RequestStatus::Completed,
            tx_hash,
            transaction_status: TransactionStatus::Committed,
            transaction_receipt: Some(notification.receipt),
            block_height: notification.block_height,
            block_timestamp: notification.block_timestamp,
        };
        return framed_response(
            &response,
            RequestStatus::Completed,
            TransactionStatus::Committed.to_string(),
        );
    }

    let Some(current) = state.handle.get_transaction_status(tx_hash).await else {
        return unavailable();
    };
    let (request_status, transaction_status) = match current.status {
        TransactionStatus::Committed => (RequestStatus::Completed, TransactionStatus::Committed),
        _ => (RequestStatus::InProcess, TransactionStatus::Pending),
    };
    let response = SendTransactionResponse {
        request_status,
        tx_hash,
        transaction_status,
        transaction_receipt: current.receipt,
        block_height: current.block_height,
        block_timestamp: current.block_timestamp,
    };
    framed_response(&response, request_status, transaction_status.to_string())
}

/// `POST /api/v1/call-method`: a read-only invocation against committed
/// state.
pub async fn call_method_handler(State(state): State<RpcState>, body: Bytes) -> Response {
    let Ok(request) = sbor::basic_decode::<CallMethodRequest>(&body) else {
        return malformed_request();
    };
    debug!(contract = %request.transaction.contract_name, "http call-method");

    let Some((output_arguments, call_result, block_height)) =
        state.handle.call_method(request.transaction).await
    else {
        return unavailable();
    };

    let response = CallMethodResponse {
        request_status: RequestStatus::Completed,
        output_arguments,
        call_result,
        block_height,
    };
    framed_response(&response, RequestStatus::Completed, call_result.to_string())
}

/// `POST /api/v1/get-transaction-status`: lookup by hash.
pub async fn get_transaction_status_handler(
    State(state): State<RpcState>,
    body: Bytes,
) -> Response {
    let Ok(request) = sbor::basic_decode::<GetTransactionStatusRequest>(&body) else {
        return malformed_request();
    };

    let Some(submission) = state.handle.get_transaction_status(request.tx_hash).await else {
        return unavailable();
    };

    let request_status = match submission.status {
        TransactionStatus::Committed => RequestStatus::Completed,
        TransactionStatus::Pending => RequestStatus::InProcess,
        _ => RequestStatus::NotFound,
    };
    let response = GetTransactionStatusResponse {
        request_status,
        transaction_status: submission.status,
        transaction_receipt: submission.receipt,
        block_height: submission.block_height,
        block_timestamp: submission.block_timestamp,
    };
    framed_response(&response, request_status, submission.status.to_string())
}
