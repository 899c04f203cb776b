//! RPC server lifecycle.

use super::handlers::{
    call_method_handler, get_transaction_status_handler, send_transaction_handler, RpcState,
};
use crate::node_loop::LoopHandle;
use axum::routing::post;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Errors from the RPC server.
#[derive(Debug, Error)]
pub enum RpcServerError {
    /// Could not bind the listen address.
    #[error("failed to bind address: {0}")]
    Bind(#[from] std::io::Error),
}

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// How long send-transaction blocks for a commit before answering
    /// IN_PROCESS.
    pub send_timeout: Duration,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            send_timeout: Duration::from_secs(2),
        }
    }
}

/// Handle over a running RPC server.
pub struct RpcServerHandle {
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Abort the server task.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the server task to finish.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// The client-facing HTTP server adapter.
pub struct RpcServer {
    config: RpcServerConfig,
    state: RpcState,
}

impl RpcServer {
    /// Create a server over a running node loop.
    pub fn new(config: RpcServerConfig, handle: Arc<LoopHandle>) -> Self {
        let send_timeout = config.send_timeout;
        Self {
            config,
            state: RpcState {
                handle,
                send_timeout,
            },
        }
    }

    fn router(state: RpcState) -> Router {
        Router::new()
            .route("/api/v1/send-transaction", post(send_transaction_handler))
            .route("/api/v1/call-method", post(call_method_handler))
            .route(
                "/api/v1/get-transaction-status",
                post(get_transaction_status_handler),
            )
            .with_state(state)
    }

    /// Bind and start serving. Returns once the socket is listening.
    pub async fn start(self) -> Result<RpcServerHandle, RpcServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "http server listening");

        let router = Self::router(self.state);
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "http server error");
            }
        });

        Ok(RpcServerHandle { task, local_addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerConfig;
    use crate::NodeLoop;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use orbit_messages::{GetTransactionStatusRequest, SendTransactionRequest,
        SendTransactionResponse};
    use orbit_network_memory::MemoryTransport;
    use orbit_node::{NodeConfig, NodeStateMachine};
    use orbit_storage_memory::{InMemoryBlockStore, InMemoryStateStore};
    use orbit_test_helpers::{federation_with_keys, test_keypair, transfer_transaction, TEST_CHAIN};
    use orbit_types::{derive_address, Hash, RequestStatus, TimestampNano, TransactionStatus,
        ValidatorId};
    use sbor::prelude::basic_encode;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tower::ServiceExt;

    fn single_node_router() -> Router {
        let (federation, mut keys) = federation_with_keys(1);
        let transport = Arc::new(MemoryTransport::new());
        transport.join(ValidatorId(0));

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let node = NodeStateMachine::new(
            NodeConfig::new(ValidatorId(0), TEST_CHAIN, federation),
            keys.remove(0).private,
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(InMemoryStateStore::new()),
            TimestampNano::from_duration(now),
        );

        let handle = Arc::new(NodeLoop::spawn(
            node,
            transport,
            tokio::runtime::Handle::current(),
            TrackerConfig::default(),
        ));
        RpcServer::router(RpcState {
            handle,
            send_timeout: Duration::from_secs(5),
        })
    }

    fn post(path: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_send_transaction_completes_on_commit() {
        let app = single_node_router();

        let sender = test_keypair(5);
        let to = derive_address(&test_keypair(6).public);
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let tx = transfer_transaction(&sender, 7, to, TimestampNano::from_duration(now));
        let tx_hash = tx.hash();
        let body = basic_encode(&SendTransactionRequest {
            signed_transaction: tx,
        })
        .unwrap();

        let response = app
            .oneshot(post("/api/v1/send-transaction", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["X-ORBS-CODE-NAME"].to_str().unwrap(),
            "COMMITTED"
        );

        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let decoded: SendTransactionResponse = sbor::basic_decode(&bytes).unwrap();
        assert_eq!(decoded.request_status, RequestStatus::Completed);
        assert_eq!(decoded.transaction_status, TransactionStatus::Committed);
        assert_eq!(decoded.transaction_receipt.unwrap().tx_hash, tx_hash);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_body_is_plain_400() {
        let app = single_node_router();
        let response = app
            .oneshot(post("/api/v1/send-transaction", b"garbage".to_vec()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()["Content-Type"].to_str().unwrap(),
            "text/plain"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_transaction_is_404() {
        let app = single_node_router();
        let body = basic_encode(&GetTransactionStatusRequest {
            tx_hash: Hash::from_bytes(b"never seen"),
        })
        .unwrap();

        let response = app
            .oneshot(post("/api/v1/get-transaction-status", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
