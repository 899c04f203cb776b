//! HTTP adapter for the client API.
//!
//! Serves the three client endpoints over framed binary bodies:
//!
//! - `POST /api/v1/send-transaction`
//! - `POST /api/v1/call-method`
//! - `POST /api/v1/get-transaction-status`
//!
//! Bodies are the canonical SBOR encodings of the `orbit-messages` client
//! types with content type `application/vnd.membuffers`; the response
//! header `X-ORBS-CODE-NAME` carries the human-readable status.

mod handlers;
mod server;

pub use handlers::{http_code_for, CONTENT_TYPE, STATUS_HEADER};
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
