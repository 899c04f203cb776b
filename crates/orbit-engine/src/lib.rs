//! Virtual machine and native contract processor.
//!
//! Contract execution is split across two halves that only meet through one
//! interface:
//!
//! - The **native processor** ([`NativeProcessor`]) owns contract code: the
//!   pre-built repository, contracts deployed at runtime, method tables,
//!   and the permission checks guarding every call.
//! - The **virtual machine** ([`VirtualMachine`]) owns execution sessions:
//!   it creates execution contexts, runs transaction sets, and serves the
//!   SDK calls contract code makes back into the system (state access,
//!   cross-contract calls, addressing).
//!
//! The cycle between them is broken by [`ContractSdkCallHandler`]: the
//! processor holds the abstract capability, registered once at wiring time,
//! and never a concrete pointer back into the VM.
//!
//! Execution is deterministic by construction: no clock, no randomness, no
//! ambient I/O - every externally observable value a contract sees flows
//! through the SDK handler. Two honest validators therefore produce
//! identical results blocks for the same transactions block.

mod compiler;
mod context;
mod contract;
pub mod contracts;
mod processor;
mod sdk;
mod vm;

pub use compiler::{BuiltinCompiler, CompileError, Compiler};
pub use context::{ContextId, ExecutionContext};
pub use contract::{
    AccessScope, ContractError, ContractRegistration, MethodDef, MethodFn, PermissionScope,
};
pub use processor::{NativeProcessor, ProcessCallInput, ProcessCallOutput, ProcessorError};
pub use sdk::{ContractSdkCallHandler, SdkCallError, SdkHandle, SdkOperation};
pub use vm::{TransactionSetResult, VirtualMachine};
