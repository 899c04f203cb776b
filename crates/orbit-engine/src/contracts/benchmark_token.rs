//! `BenchmarkToken`: the demo token contract.
//!
//! Balances are keyed by account address. Every address starts with a
//! fixed faucet balance so transfers are exercisable without a mint flow.

use crate::contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, PermissionScope,
};
use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::sync::Arc;

/// Initial balance of every address.
pub const FAUCET_BALANCE: u64 = 1_000_000_000;

fn balance_key(address: &[u8]) -> Vec<u8> {
    let mut key = b"balance.".to_vec();
    key.extend_from_slice(address);
    key
}

fn read_balance(sdk: &SdkHandle<'_>, address: &[u8]) -> Result<u64, ContractError> {
    sdk.state_read_u64(&balance_key(address), FAUCET_BALANCE)
}

fn transfer(sdk: &SdkHandle<'_>, args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    let (Some(amount), Some(to)) = (
        args.first().and_then(|a| a.as_u64()),
        args.get(1).and_then(|a| a.as_bytes()),
    ) else {
        return Err(ContractError::new(
            "transfer expects (amount: u64, to: bytes)",
        ));
    };

    let from = sdk.signer_address()?;
    let from_balance = read_balance(sdk, &from)?;
    if amount > from_balance {
        return Err(ContractError::new(format!(
            "insufficient funds: balance {from_balance}, transfer {amount}"
        )));
    }

    // Self-transfer must not double-apply.
    if from == to {
        return Ok(vec![]);
    }

    let to_balance = read_balance(sdk, to)?;
    sdk.state_write_u64(&balance_key(&from), from_balance - amount)?;
    sdk.state_write_u64(&balance_key(to), to_balance.saturating_add(amount))?;
    Ok(vec![])
}

fn get_balance(sdk: &SdkHandle<'_>, args: &[Argument]) -> Result<Vec<Argument>, ContractError> {
    let Some(address) = args.first().and_then(|a| a.as_bytes()) else {
        return Err(ContractError::new("getBalance expects (address: bytes)"));
    };
    Ok(vec![Argument::Uint64(read_balance(sdk, address)?)])
}

/// Build the registration.
pub fn contract() -> ContractRegistration {
    ContractRegistration {
        name: super::BENCHMARK_TOKEN_CONTRACT.to_string(),
        permission: PermissionScope::Service,
        methods: vec![
            MethodDef {
                name: "transfer",
                access: AccessScope::ReadWrite,
                permission_required: PermissionScope::Service,
                handler: Arc::new(transfer),
            },
            MethodDef {
                name: "getBalance",
                access: AccessScope::Read,
                permission_required: PermissionScope::Service,
                handler: Arc::new(get_balance),
            },
        ],
    }
}
