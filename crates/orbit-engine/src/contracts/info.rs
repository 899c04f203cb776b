//! `_Info`: liveness probe system contract.

use crate::contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, PermissionScope,
};
use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::sync::Arc;

fn is_alive(_sdk: &SdkHandle<'_>, _args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    Ok(vec![Argument::String("alive".to_string())])
}

/// Build the registration.
pub fn contract() -> ContractRegistration {
    ContractRegistration {
        name: super::INFO_CONTRACT.to_string(),
        permission: PermissionScope::System,
        methods: vec![MethodDef {
            name: "isAlive",
            access: AccessScope::Read,
            permission_required: PermissionScope::Service,
            handler: Arc::new(is_alive),
        }],
    }
}
