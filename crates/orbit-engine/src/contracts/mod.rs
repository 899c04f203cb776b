//! Pre-built contract repository.
//!
//! System contracts (`_Deployments`, `_GlobalPreOrder`, `_Info`) plus the
//! `BenchmarkToken` demo contract ship with the processor. Deployable
//! templates (`Counter`) are instantiated on demand by the compiler.

pub mod benchmark_token;
pub mod counter;
pub mod deployments;
pub mod global_preorder;
pub mod info;

use crate::contract::ContractRegistration;

/// Name of the deployment registry system contract.
pub const DEPLOYMENTS_CONTRACT: &str = "_Deployments";

/// Name of the pre-order gate system contract.
pub const GLOBAL_PREORDER_CONTRACT: &str = "_GlobalPreOrder";

/// Name of the liveness probe system contract.
pub const INFO_CONTRACT: &str = "_Info";

/// Name of the demo token contract.
pub const BENCHMARK_TOKEN_CONTRACT: &str = "BenchmarkToken";

/// All contracts registered at processor initialization.
pub fn prebuilt_repository() -> Vec<ContractRegistration> {
    vec![
        deployments::contract(),
        global_preorder::contract(),
        info::contract(),
        benchmark_token::contract(),
    ]
}
