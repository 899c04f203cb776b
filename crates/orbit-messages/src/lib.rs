//! Message types exchanged between Orbit nodes and with clients.
//!
//! Organized by concern:
//! - [`gossip`]: transaction relay and consensus messages
//! - [`sync`]: block sync request/response pairs
//! - [`client`]: HTTP client API request/response framing
//!
//! Every wire message implements [`orbit_types::NetworkMessage`] with a
//! stable type id; payloads are canonically SBOR-encoded.

pub mod client;
pub mod gossip;
pub mod sync;

pub use client::{
    CallMethodRequest, CallMethodResponse, GetTransactionStatusRequest,
    GetTransactionStatusResponse, SendTransactionRequest, SendTransactionResponse,
};
pub use gossip::{BlockCommit, BlockProposal, BlockVote, ForwardedTransactions};
pub use sync::{
    BlockAvailabilityRequest, BlockAvailabilityResponse, BlockSyncRequest, BlockSyncResponse,
};
