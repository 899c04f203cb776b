//! The SDK surface between contract code and system services.
//!
//! The processor executes contract code; the code reaches state storage,
//! other contracts, and addressing exclusively through the
//! [`ContractSdkCallHandler`] registered at wiring time. Contract methods
//! receive an [`SdkHandle`] wrapping that handler with the executing
//! context's identity.

use crate::contract::{ContractError, PermissionScope};
use crate::context::ContextId;
use orbit_types::Argument;
use sbor::prelude::basic_encode;

/// SDK operation families, demultiplexed by the virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkOperation {
    /// `Sdk.State`: read/write the calling contract's state namespace.
    State,
    /// `Sdk.Service`: contract discovery and re-entrant calls.
    Service,
    /// `Sdk.Address`: signer address derivation.
    Address,
}

impl SdkOperation {
    /// Wire name of the operation family.
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkOperation::State => "Sdk.State",
            SdkOperation::Service => "Sdk.Service",
            SdkOperation::Address => "Sdk.Address",
        }
    }
}

/// Errors surfaced by the SDK call handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkCallError {
    /// The context id does not name a live execution context.
    #[error("unknown execution context")]
    UnknownContext,

    /// Unknown operation/method combination or malformed arguments.
    #[error("invalid SDK call {operation}.{method}: {reason}")]
    InvalidCall {
        /// Operation family.
        operation: &'static str,
        /// Method within the family.
        method: String,
        /// What was wrong.
        reason: String,
    },

    /// A write was attempted in a read-only session.
    #[error("state write in read-only access scope")]
    WriteInReadScope,

    /// A nested call failed; the message carries the callee's error.
    #[error("call failed: {0}")]
    CallFailed(String),
}

/// The back-edge from the processor into system services.
///
/// Registered once at init by the wiring code; the processor holds this
/// abstract capability rather than a concrete pointer into the VM.
pub trait ContractSdkCallHandler: Send + Sync {
    /// Handle one SDK call from running contract code.
    ///
    /// `permission_scope` is the permission of the contract issuing the
    /// call (not of the transaction signer).
    fn handle_sdk_call(
        &self,
        context_id: ContextId,
        operation: SdkOperation,
        method_name: &str,
        input_arguments: Vec<Argument>,
        permission_scope: PermissionScope,
    ) -> Result<Vec<Argument>, SdkCallError>;
}

/// The capability handed to an executing contract method.
///
/// Wraps the registered handler with the executing context id and the
/// contract's own permission scope, and exposes typed helpers over the raw
/// argument-array protocol.
pub struct SdkHandle<'a> {
    handler: &'a dyn ContractSdkCallHandler,
    context_id: ContextId,
    permission_scope: PermissionScope,
}

impl<'a> SdkHandle<'a> {
    /// Create a handle for one method invocation.
    pub fn new(
        handler: &'a dyn ContractSdkCallHandler,
        context_id: ContextId,
        permission_scope: PermissionScope,
    ) -> Self {
        Self {
            handler,
            context_id,
            permission_scope,
        }
    }

    /// The executing context id.
    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    fn call(
        &self,
        operation: SdkOperation,
        method: &str,
        args: Vec<Argument>,
    ) -> Result<Vec<Argument>, ContractError> {
        self.handler
            .handle_sdk_call(self.context_id, operation, method, args, self.permission_scope)
            .map_err(|e| ContractError::new(e.to_string()))
    }

    // ── Sdk.State ────────────────────────────────────────────────────

    /// Read a variable from the calling contract's namespace.
    ///
    /// Returns empty bytes when the variable was never written.
    pub fn state_read(&self, key: &[u8]) -> Result<Vec<u8>, ContractError> {
        let out = self.call(
            SdkOperation::State,
            "read",
            vec![Argument::Bytes(key.to_vec())],
        )?;
        match out.first() {
            Some(Argument::Bytes(value)) => Ok(value.clone()),
            _ => Err(ContractError::new("Sdk.State.read returned corrupt output")),
        }
    }

    /// Write a variable in the calling contract's namespace.
    pub fn state_write(&self, key: &[u8], value: &[u8]) -> Result<(), ContractError> {
        self.call(
            SdkOperation::State,
            "write",
            vec![
                Argument::Bytes(key.to_vec()),
                Argument::Bytes(value.to_vec()),
            ],
        )?;
        Ok(())
    }

    /// Read a u64 variable; `default` when unset.
    pub fn state_read_u64(&self, key: &[u8], default: u64) -> Result<u64, ContractError> {
        let raw = self.state_read(key)?;
        if raw.is_empty() {
            return Ok(default);
        }
        let bytes: [u8; 8] = raw
            .try_into()
            .map_err(|_| ContractError::new("stored value is not a u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Write a u64 variable.
    pub fn state_write_u64(&self, key: &[u8], value: u64) -> Result<(), ContractError> {
        self.state_write(key, &value.to_le_bytes())
    }

    // ── Sdk.Service ──────────────────────────────────────────────────

    /// Check whether a named contract exists in the repository.
    pub fn is_native(&self, service_name: &str) -> Result<(), ContractError> {
        self.call(
            SdkOperation::Service,
            "isNative",
            vec![Argument::String(service_name.to_string())],
        )?;
        Ok(())
    }

    /// Call a method on another contract.
    ///
    /// Re-entrant: the callee executes within the same execution context,
    /// pushed onto the service stack for the duration of the call.
    pub fn call_method(
        &self,
        service_name: &str,
        method_name: &str,
        args: &[Argument],
    ) -> Result<Vec<Argument>, ContractError> {
        let encoded_args =
            basic_encode(&args.to_vec()).map_err(|_| ContractError::new("args encoding failed"))?;
        let out = self.call(
            SdkOperation::Service,
            "callMethod",
            vec![
                Argument::String(service_name.to_string()),
                Argument::String(method_name.to_string()),
                Argument::Bytes(encoded_args),
            ],
        )?;
        match out.first() {
            Some(Argument::Bytes(encoded)) => sbor::basic_decode(encoded)
                .map_err(|_| ContractError::new("callMethod returned corrupt output")),
            _ => Err(ContractError::new("callMethod returned corrupt output")),
        }
    }

    // ── Sdk.Address ──────────────────────────────────────────────────

    /// The derived address of the transaction signer.
    pub fn signer_address(&self) -> Result<Vec<u8>, ContractError> {
        let out = self.call(SdkOperation::Address, "getSignerAddress", vec![])?;
        match out.first() {
            Some(Argument::Bytes(address)) => Ok(address.clone()),
            _ => Err(ContractError::new(
                "Sdk.Address.getSignerAddress returned corrupt output",
            )),
        }
    }
}
