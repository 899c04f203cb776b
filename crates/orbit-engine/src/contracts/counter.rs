//! `Counter`: the deployable counter template.
//!
//! Instantiated by the compiler from deployed code carrying the start
//! value. The counter itself lives in contract state; until the first
//! `add`, `get` reports the start value.

use crate::contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, PermissionScope,
};
use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::sync::Arc;

const COUNT_KEY: &[u8] = b"count";

/// Build a registration for a counter deployed under `name` starting at
/// `start`.
pub fn contract(name: &str, start: u64) -> ContractRegistration {
    let get = {
        move |sdk: &SdkHandle<'_>, _args: &[Argument]| -> Result<Vec<Argument>, ContractError> {
            Ok(vec![Argument::Uint64(sdk.state_read_u64(COUNT_KEY, start)?)])
        }
    };

    let add = {
        move |sdk: &SdkHandle<'_>, args: &[Argument]| -> Result<Vec<Argument>, ContractError> {
            let Some(amount) = args.first().and_then(|a| a.as_u64()) else {
                return Err(ContractError::new("add expects (amount: u64)"));
            };
            let current = sdk.state_read_u64(COUNT_KEY, start)?;
            sdk.state_write_u64(COUNT_KEY, current.wrapping_add(amount))?;
            Ok(vec![])
        }
    };

    let start_fn = {
        move |_sdk: &SdkHandle<'_>, _args: &[Argument]| -> Result<Vec<Argument>, ContractError> {
            Ok(vec![Argument::Uint64(start)])
        }
    };

    ContractRegistration {
        name: name.to_string(),
        permission: PermissionScope::Service,
        methods: vec![
            MethodDef {
                name: "get",
                access: AccessScope::Read,
                permission_required: PermissionScope::Service,
                handler: Arc::new(get),
            },
            MethodDef {
                name: "add",
                access: AccessScope::ReadWrite,
                permission_required: PermissionScope::Service,
                handler: Arc::new(add),
            },
            MethodDef {
                name: "start",
                access: AccessScope::Read,
                permission_required: PermissionScope::Service,
                handler: Arc::new(start_fn),
            },
        ],
    }
}
