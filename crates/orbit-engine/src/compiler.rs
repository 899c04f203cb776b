//! Deployable contract instantiation.
//!
//! Deployed code travels as opaque bytes written into the deployment
//! registry's state. A [`Compiler`] turns (name, code) into a runnable
//! [`ContractRegistration`]; the shipped [`BuiltinCompiler`] instantiates
//! the known templates.

use crate::contract::ContractRegistration;
use crate::contracts;
use thiserror::Error;

/// Errors from contract instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No template matches the contract name.
    #[error("no template for contract {0}")]
    UnknownTemplate(String),

    /// The code bytes do not decode for the matched template.
    #[error("invalid code for contract {0}")]
    InvalidCode(String),
}

/// Turns deployed code bytes into a runnable contract.
pub trait Compiler: Send + Sync {
    /// Instantiate the contract `name` from its deployed `code`.
    fn compile(&self, name: &str, code: &[u8]) -> Result<ContractRegistration, CompileError>;
}

/// The shipped compiler: recognizes built-in templates by name prefix.
///
/// - `Counter*`: code is the SBOR-encoded u64 start value.
pub struct BuiltinCompiler;

impl Compiler for BuiltinCompiler {
    fn compile(&self, name: &str, code: &[u8]) -> Result<ContractRegistration, CompileError> {
        if name.starts_with("Counter") {
            let start: u64 = sbor::basic_decode(code)
                .map_err(|_| CompileError::InvalidCode(name.to_string()))?;
            return Ok(contracts::counter::contract(name, start));
        }
        Err(CompileError::UnknownTemplate(name.to_string()))
    }
}
