//! The native contract processor.
//!
//! Owns contract code: the pre-built repository, contracts deployed at
//! runtime, and the permission checks guarding every call. Reaches the rest
//! of the system only through the [`ContractSdkCallHandler`] registered
//! once at wiring time.

use crate::compiler::Compiler;
use crate::context::ContextId;
use crate::contract::{AccessScope, ContractRegistration, PermissionScope};
use crate::contracts;
use crate::sdk::{ContractSdkCallHandler, SdkHandle};
use orbit_types::{Argument, ExecutionResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Input of one contract method invocation.
#[derive(Debug, Clone)]
pub struct ProcessCallInput {
    /// The session the call executes in.
    pub context_id: ContextId,
    /// Target contract.
    pub contract_name: String,
    /// Target method.
    pub method_name: String,
    /// Typed inputs.
    pub input_arguments: Vec<Argument>,
    /// The contract (or "" for an external client) making this call.
    pub calling_service: String,
    /// Permission held by the caller.
    pub calling_permission_scope: PermissionScope,
    /// Access scope of the session.
    pub access_scope: AccessScope,
}

/// Output of one contract method invocation.
#[derive(Debug, Clone)]
pub struct ProcessCallOutput {
    /// Typed outputs. On failure, a single string argument carrying the
    /// error message.
    pub output_arguments: Vec<Argument>,
    /// How the call ended.
    pub call_result: ExecutionResult,
}

impl ProcessCallOutput {
    fn failure(result: ExecutionResult, message: String) -> Self {
        Self {
            output_arguments: vec![Argument::String(message)],
            call_result: result,
        }
    }

    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        self.call_result == ExecutionResult::Success
    }

    /// The error message from a failed call, if any.
    pub fn error_message(&self) -> Option<&str> {
        if self.is_success() {
            return None;
        }
        self.output_arguments.first().and_then(|a| a.as_str())
    }
}

/// Resolution and permission failures. These are never raised by contract
/// code itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    /// No SDK call handler registered yet.
    #[error("processor not initialized: no SDK call handler registered")]
    NotInitialized,

    /// The named contract does not exist.
    #[error("contract {0} not found")]
    ContractNotFound(String),

    /// The named method does not exist on the contract.
    #[error("method {method} not found on contract {contract}")]
    MethodNotFound {
        /// Resolved contract.
        contract: String,
        /// Missing method.
        method: String,
    },

    /// Caller permission does not satisfy the method's requirement.
    #[error("method {method} on {contract} requires SYSTEM permission")]
    PermissionDenied {
        /// Target contract.
        contract: String,
        /// Target method.
        method: String,
    },

    /// The session's access scope does not allow this method.
    #[error("method {method} on {contract} requires write access")]
    WriteAccessDenied {
        /// Target contract.
        contract: String,
        /// Target method.
        method: String,
    },
}

/// The native processor: contract repository plus call gateway.
///
/// Shared read-mostly by all VM sessions: the repository takes concurrent
/// reads during calls and an exclusive write only on deploy and at init.
pub struct NativeProcessor {
    /// The back-edge into system services. Registered once.
    handler: RwLock<Option<Arc<dyn ContractSdkCallHandler>>>,

    /// Pre-built contracts, populated when the handler is registered.
    repository: RwLock<HashMap<String, ContractRegistration>>,

    /// Contracts deployed at runtime. Cached for process lifetime.
    deployed: RwLock<HashMap<String, ContractRegistration>>,

    /// Instantiates deployable contract code.
    compiler: Arc<dyn Compiler>,
}

impl NativeProcessor {
    /// Create a processor with the given deployable-contract compiler.
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            handler: RwLock::new(None),
            repository: RwLock::new(HashMap::new()),
            deployed: RwLock::new(HashMap::new()),
            compiler,
        }
    }

    /// Register the SDK call handler and populate the pre-built repository.
    ///
    /// Runs once at system initialization, called by the wiring that
    /// constructs the virtual machine.
    pub fn register_sdk_call_handler(&self, handler: Arc<dyn ContractSdkCallHandler>) {
        let mut slot = self.handler.write();
        let first = slot.is_none();
        *slot = Some(handler);

        if first {
            let mut repository = self.repository.write();
            for registration in contracts::prebuilt_repository() {
                repository.insert(registration.name.clone(), registration);
            }
            info!(contracts = repository.len(), "native processor initialized");
        }
    }

    fn sdk_handler(&self) -> Result<Arc<dyn ContractSdkCallHandler>, ProcessorError> {
        self.handler
            .read()
            .clone()
            .ok_or(ProcessorError::NotInitialized)
    }

    /// Resolve a contract: pre-built repository, then the deployed cache,
    /// then the deployment registry's stored code (compiled and cached).
    fn resolve_contract(
        &self,
        context_id: ContextId,
        name: &str,
    ) -> Result<ContractRegistration, ProcessorError> {
        if let Some(found) = self.repository.read().get(name) {
            return Ok(found.clone());
        }
        if let Some(found) = self.deployed.read().get(name) {
            return Ok(found.clone());
        }

        // Not cached: fetch the deployed code through the deployment system
        // contract and compile it.
        let handler = self.sdk_handler()?;
        let sdk = SdkHandle::new(handler.as_ref(), context_id, PermissionScope::System);
        let output = sdk
            .call_method(
                contracts::DEPLOYMENTS_CONTRACT,
                "getCode",
                &[Argument::String(name.to_string())],
            )
            .map_err(|_| ProcessorError::ContractNotFound(name.to_string()))?;

        let code = output
            .first()
            .and_then(|a| a.as_bytes())
            .ok_or_else(|| ProcessorError::ContractNotFound(name.to_string()))?;

        let registration = self
            .compiler
            .compile(name, code)
            .map_err(|_| ProcessorError::ContractNotFound(name.to_string()))?;

        debug!(contract = name, "compiled deployed contract");
        self.deployed
            .write()
            .insert(name.to_string(), registration.clone());
        Ok(registration)
    }

    /// The permission scope of a contract, resolving deployed code if
    /// needed.
    pub fn get_contract_info(
        &self,
        context_id: ContextId,
        contract_name: &str,
    ) -> Result<PermissionScope, ProcessorError> {
        self.resolve_contract(context_id, contract_name)
            .map(|c| c.permission)
    }

    /// Execute one contract method under the permission model.
    ///
    /// Resolution and permission failures report `ERROR_UNEXPECTED`; an
    /// error raised by the contract reports `ERROR_SMART_CONTRACT`; both
    /// carry the message in the output arguments.
    pub fn process_call(&self, input: ProcessCallInput) -> ProcessCallOutput {
        let handler = match self.sdk_handler() {
            Ok(handler) => handler,
            Err(e) => {
                return ProcessCallOutput::failure(ExecutionResult::ErrorUnexpected, e.to_string())
            }
        };

        let contract = match self.resolve_contract(input.context_id, &input.contract_name) {
            Ok(contract) => contract,
            Err(e) => {
                return ProcessCallOutput::failure(ExecutionResult::ErrorUnexpected, e.to_string())
            }
        };

        let method = match contract.method(&input.method_name) {
            Some(method) => method,
            None => {
                let e = ProcessorError::MethodNotFound {
                    contract: input.contract_name.clone(),
                    method: input.method_name.clone(),
                };
                return ProcessCallOutput::failure(ExecutionResult::ErrorUnexpected, e.to_string());
            }
        };

        if !input
            .calling_permission_scope
            .satisfies(method.permission_required)
        {
            let e = ProcessorError::PermissionDenied {
                contract: input.contract_name.clone(),
                method: input.method_name.clone(),
            };
            return ProcessCallOutput::failure(ExecutionResult::ErrorUnexpected, e.to_string());
        }

        if !input.access_scope.satisfies(method.access) {
            let e = ProcessorError::WriteAccessDenied {
                contract: input.contract_name.clone(),
                method: input.method_name.clone(),
            };
            return ProcessCallOutput::failure(ExecutionResult::ErrorUnexpected, e.to_string());
        }

        debug!(
            contract = %input.contract_name,
            method = %input.method_name,
            caller = %input.calling_service,
            "processor executing contract"
        );

        let sdk = SdkHandle::new(handler.as_ref(), input.context_id, contract.permission);
        match (method.handler)(&sdk, &input.input_arguments) {
            Ok(output_arguments) => ProcessCallOutput {
                output_arguments,
                call_result: ExecutionResult::Success,
            },
            Err(contract_err) => {
                debug!(error = %contract_err, "contract returned error");
                ProcessCallOutput::failure(
                    ExecutionResult::ErrorSmartContract,
                    contract_err.to_string(),
                )
            }
        }
    }
}
