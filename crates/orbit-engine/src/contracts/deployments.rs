//! `_Deployments`: the deployment registry system contract.
//!
//! Deployed code lives in this contract's own state namespace, keyed by
//! service name. The processor fetches it back through `getCode` when it
//! resolves a contract that is not in its caches.

use crate::contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, PermissionScope,
};
use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::sync::Arc;

fn code_key(service_name: &str) -> Vec<u8> {
    let mut key = b"code.".to_vec();
    key.extend_from_slice(service_name.as_bytes());
    key
}

fn deploy_service(sdk: &SdkHandle<'_>, args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    let (Some(name), Some(code)) = (
        args.first().and_then(|a| a.as_str()),
        args.get(1).and_then(|a| a.as_bytes()),
    ) else {
        return Err(ContractError::new(
            "deployService expects (serviceName: string, code: bytes)",
        ));
    };

    if name.is_empty() || code.is_empty() {
        return Err(ContractError::new("service name and code must be non-empty"));
    }

    // A name that already resolves (pre-built or previously deployed) is taken.
    if sdk.is_native(name).is_ok() {
        return Err(ContractError::new(format!(
            "service {name} is already deployed"
        )));
    }

    sdk.state_write(&code_key(name), code)?;
    Ok(vec![])
}

fn get_code(sdk: &SdkHandle<'_>, args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    let Some(name) = args.first().and_then(|a| a.as_str()) else {
        return Err(ContractError::new("getCode expects (serviceName: string)"));
    };

    let code = sdk.state_read(&code_key(name))?;
    if code.is_empty() {
        return Err(ContractError::new(format!("service {name} is not deployed")));
    }
    Ok(vec![Argument::Bytes(code)])
}

fn get_info(sdk: &SdkHandle<'_>, args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    let Some(name) = args.first().and_then(|a| a.as_str()) else {
        return Err(ContractError::new("getInfo expects (serviceName: string)"));
    };

    let code = sdk.state_read(&code_key(name))?;
    if code.is_empty() {
        return Err(ContractError::new(format!("service {name} is not deployed")));
    }
    Ok(vec![Argument::String(name.to_string())])
}

/// Build the registration.
pub fn contract() -> ContractRegistration {
    ContractRegistration {
        name: super::DEPLOYMENTS_CONTRACT.to_string(),
        permission: PermissionScope::System,
        methods: vec![
            MethodDef {
                name: "deployService",
                access: AccessScope::ReadWrite,
                permission_required: PermissionScope::Service,
                handler: Arc::new(deploy_service),
            },
            MethodDef {
                name: "getCode",
                access: AccessScope::Read,
                permission_required: PermissionScope::Service,
                handler: Arc::new(get_code),
            },
            MethodDef {
                name: "getInfo",
                access: AccessScope::Read,
                permission_required: PermissionScope::Service,
                handler: Arc::new(get_info),
            },
        ],
    }
}
