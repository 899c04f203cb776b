//! Per-call execution contexts.

use crate::contract::{AccessScope, PermissionScope};
use orbit_types::{BlockHeight, ContractStateDiff, PublicKey, StateRecord};
use std::collections::HashMap;
use std::fmt;

/// Identifier native code uses to call back into its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Per-call scratchpad: the service stack, access scope, and uncommitted
/// state deltas of one `ProcessCall` session.
///
/// The stack is single-owner, last-in-first-out, and never shared across
/// threads; all mutation happens through the owning VM session.
pub struct ExecutionContext {
    /// This context's id.
    pub context_id: ContextId,
    /// Height of the block being built or queried.
    pub block_height: BlockHeight,
    /// Read vs read-write session.
    pub access_scope: AccessScope,
    /// Transaction signer, when executing a signed transaction.
    pub signer: Option<PublicKey>,

    /// Stack of (contract name, permission scope) frames.
    service_stack: Vec<(String, PermissionScope)>,

    /// Writes from earlier transactions of the same session, visible to
    /// reads but excluded from this context's own diff.
    base_values: HashMap<(String, Vec<u8>), Vec<u8>>,

    /// Uncommitted writes: (contract, key) → value, plus first-write order.
    write_values: HashMap<(String, Vec<u8>), Vec<u8>>,
    write_order: Vec<(String, Vec<u8>)>,
}

impl ExecutionContext {
    /// Create a fresh context.
    pub fn new(
        context_id: ContextId,
        block_height: BlockHeight,
        access_scope: AccessScope,
        signer: Option<PublicKey>,
    ) -> Self {
        Self {
            context_id,
            block_height,
            access_scope,
            signer,
            service_stack: Vec::new(),
            base_values: HashMap::new(),
            write_values: HashMap::new(),
            write_order: Vec::new(),
        }
    }

    /// Seed reads with the accumulated writes of earlier transactions in
    /// the same session.
    pub fn seed_base(&mut self, base: HashMap<(String, Vec<u8>), Vec<u8>>) {
        self.base_values = base;
    }

    /// Push a frame. Done when entering a contract call.
    pub fn stack_push(&mut self, contract_name: String, permission: PermissionScope) {
        self.service_stack.push((contract_name, permission));
    }

    /// Pop a frame. Must be done on every exit path of a call.
    pub fn stack_pop(&mut self) {
        self.service_stack.pop();
    }

    /// The executing frame: (contract name, permission scope).
    ///
    /// An empty stack reads as an external client at SERVICE permission.
    pub fn stack_top(&self) -> (String, PermissionScope) {
        self.service_stack
            .last()
            .cloned()
            .unwrap_or_else(|| (String::new(), PermissionScope::Service))
    }

    /// Current stack depth.
    pub fn stack_depth(&self) -> usize {
        self.service_stack.len()
    }

    /// Record a write in the executing contract's namespace.
    pub fn record_write(&mut self, contract_name: String, key: Vec<u8>, value: Vec<u8>) {
        let slot = (contract_name, key);
        if !self.write_values.contains_key(&slot) {
            self.write_order.push(slot.clone());
        }
        self.write_values.insert(slot, value);
    }

    /// Read through the uncommitted layers: this call's own writes first,
    /// then the session base. `None` falls through to committed state.
    pub fn read_visible(&self, contract_name: &str, key: &[u8]) -> Option<Vec<u8>> {
        let slot = (contract_name.to_string(), key.to_vec());
        self.write_values
            .get(&slot)
            .or_else(|| self.base_values.get(&slot))
            .cloned()
    }

    /// Collapse the write set into ordered per-contract diffs.
    ///
    /// Contracts appear in first-touch order, records in first-write order
    /// with the final value for each key.
    pub fn into_state_diffs(self) -> Vec<ContractStateDiff> {
        let mut diffs: Vec<ContractStateDiff> = Vec::new();
        let mut index_of: HashMap<String, usize> = HashMap::new();

        for (contract, key) in self.write_order {
            let value = self.write_values[&(contract.clone(), key.clone())].clone();
            let idx = *index_of.entry(contract.clone()).or_insert_with(|| {
                diffs.push(ContractStateDiff {
                    contract_name: contract.clone(),
                    records: Vec::new(),
                });
                diffs.len() - 1
            });
            diffs[idx].records.push(StateRecord { key, value });
        }

        diffs
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("context_id", &self.context_id)
            .field("block_height", &self.block_height)
            .field("access_scope", &self.access_scope)
            .field("stack_depth", &self.service_stack.len())
            .field("writes", &self.write_order.len())
            .finish()
    }
}
