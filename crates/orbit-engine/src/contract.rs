//! Contract metadata: permissions, access scopes, and method tables.

use crate::sdk::SdkHandle;
use orbit_types::Argument;
use std::fmt;
use std::sync::Arc;

/// Coarse capability tag attached to a contract and checked on every
/// cross-contract call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionScope {
    /// Reserved for system contracts. A SYSTEM method may only be invoked
    /// when the caller at the top of the service stack also holds SYSTEM.
    System,
    /// Ordinary contracts. SERVICE methods are callable by any caller.
    Service,
}

impl PermissionScope {
    /// Whether a caller with this scope satisfies a method requiring
    /// `required`.
    pub fn satisfies(&self, required: PermissionScope) -> bool {
        match required {
            PermissionScope::System => *self == PermissionScope::System,
            PermissionScope::Service => true,
        }
    }
}

/// Read vs read-write access of an execution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessScope {
    /// State reads only. Used by read-only client calls and pre-order runs.
    Read,
    /// State reads and writes. Used when executing an ordered block.
    ReadWrite,
}

impl AccessScope {
    /// Whether this session scope satisfies a method requiring `required`.
    pub fn satisfies(&self, required: AccessScope) -> bool {
        match required {
            AccessScope::ReadWrite => *self == AccessScope::ReadWrite,
            AccessScope::Read => true,
        }
    }
}

/// An error raised by contract code itself.
///
/// Distinct from resolution/permission failures: a raised error reports as
/// `ERROR_SMART_CONTRACT`, everything else as `ERROR_UNEXPECTED`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ContractError(pub String);

impl ContractError {
    /// Convenience constructor.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A contract method implementation.
///
/// Methods receive an [`SdkHandle`] carrying the capability to call back
/// into system services, plus the typed input arguments.
pub type MethodFn =
    Arc<dyn Fn(&SdkHandle<'_>, &[Argument]) -> Result<Vec<Argument>, ContractError> + Send + Sync>;

/// One entry of a contract's method table.
#[derive(Clone)]
pub struct MethodDef {
    /// Method name.
    pub name: &'static str,
    /// Access this method needs from the session.
    pub access: AccessScope,
    /// Permission the caller must hold.
    pub permission_required: PermissionScope,
    /// The implementation.
    pub handler: MethodFn,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("permission_required", &self.permission_required)
            .finish()
    }
}

/// A contract as registered with the processor: identity, permission, and
/// method table.
#[derive(Debug, Clone)]
pub struct ContractRegistration {
    /// Contract name, unique within the repository.
    pub name: String,
    /// The contract's own permission scope.
    pub permission: PermissionScope,
    /// Callable methods.
    pub methods: Vec<MethodDef>,
}

impl ContractRegistration {
    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_satisfaction() {
        assert!(PermissionScope::System.satisfies(PermissionScope::System));
        assert!(PermissionScope::System.satisfies(PermissionScope::Service));
        assert!(!PermissionScope::Service.satisfies(PermissionScope::System));
        assert!(PermissionScope::Service.satisfies(PermissionScope::Service));
    }

    #[test]
    fn test_access_satisfaction() {
        assert!(AccessScope::ReadWrite.satisfies(AccessScope::Read));
        assert!(AccessScope::ReadWrite.satisfies(AccessScope::ReadWrite));
        assert!(AccessScope::Read.satisfies(AccessScope::Read));
        assert!(!AccessScope::Read.satisfies(AccessScope::ReadWrite));
    }
}
