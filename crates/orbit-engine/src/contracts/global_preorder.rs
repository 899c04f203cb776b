//! `_GlobalPreOrder`: the pre-order gate system contract.
//!
//! Consulted for every transaction in a proposed set before ordering is
//! finalized. Approves unconditionally; subscription and quota policies
//! would hook in here.

use crate::contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, PermissionScope,
};
use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::sync::Arc;

fn approve(_sdk: &SdkHandle<'_>, _args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    Ok(vec![])
}

/// Build the registration.
pub fn contract() -> ContractRegistration {
    ContractRegistration {
        name: super::GLOBAL_PREORDER_CONTRACT.to_string(),
        permission: PermissionScope::System,
        methods: vec![MethodDef {
            name: "approve",
            access: AccessScope::Read,
            permission_required: PermissionScope::System,
            handler: Arc::new(approve),
        }],
    }
}
