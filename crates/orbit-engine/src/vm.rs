//! The virtual machine: session orchestration over the native processor.
//!
//! Owns execution contexts for the lifetime of a single call, dispatches
//! SDK calls from running contracts back into system services, and commits
//! state deltas produced by successful transactions into per-block diffs.

use crate::context::{ContextId, ExecutionContext};
use crate::contract::{AccessScope, PermissionScope};
use crate::processor::{NativeProcessor, ProcessCallInput};
use crate::sdk::{ContractSdkCallHandler, SdkCallError, SdkOperation};
use orbit_storage::StatePersistence;
use orbit_types::{
    derive_address, Argument, BlockHeight, ContractStateDiff, ExecutionResult, PreOrderStatus,
    SignedTransaction, StateRecord, Transaction, TransactionReceipt,
};
use parking_lot::Mutex;
use sbor::prelude::basic_encode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Receipts and state diffs produced by executing one ordered set.
#[derive(Debug, Clone)]
pub struct TransactionSetResult {
    /// One receipt per transaction, in set order.
    pub receipts: Vec<TransactionReceipt>,
    /// Collapsed state diffs of all successful transactions.
    pub state_diffs: Vec<ContractStateDiff>,
}

/// The virtual machine.
///
/// One instance per node; shared by consensus execution, read-only client
/// calls, and pre-order validation. Sessions are isolated through their
/// execution contexts; contexts are never shared across threads.
pub struct VirtualMachine {
    processor: Arc<NativeProcessor>,
    state: Arc<dyn StatePersistence>,
    contexts: Mutex<HashMap<ContextId, ExecutionContext>>,
    next_context_id: Mutex<u64>,
}

impl VirtualMachine {
    /// Wire a virtual machine over the processor and state storage.
    ///
    /// Registers itself as the processor's SDK call handler; this is the
    /// single registration point breaking the VM ↔ processor cycle.
    pub fn new(processor: Arc<NativeProcessor>, state: Arc<dyn StatePersistence>) -> Arc<Self> {
        let vm = Arc::new(Self {
            processor: Arc::clone(&processor),
            state,
            contexts: Mutex::new(HashMap::new()),
            next_context_id: Mutex::new(0),
        });
        processor.register_sdk_call_handler(vm.clone() as Arc<dyn ContractSdkCallHandler>);
        vm
    }

    /// The processor this VM drives.
    pub fn processor(&self) -> &Arc<NativeProcessor> {
        &self.processor
    }

    fn create_context(
        &self,
        block_height: BlockHeight,
        access_scope: AccessScope,
        signer: Option<orbit_types::PublicKey>,
        base: HashMap<(String, Vec<u8>), Vec<u8>>,
    ) -> ContextId {
        let id = {
            let mut next = self.next_context_id.lock();
            *next += 1;
            ContextId(*next)
        };
        let mut context = ExecutionContext::new(id, block_height, access_scope, signer);
        context.seed_base(base);
        self.contexts.lock().insert(id, context);
        id
    }

    fn remove_context(&self, id: ContextId) -> Option<ExecutionContext> {
        self.contexts.lock().remove(&id)
    }

    fn with_context<R>(
        &self,
        id: ContextId,
        f: impl FnOnce(&mut ExecutionContext) -> R,
    ) -> Result<R, SdkCallError> {
        let mut contexts = self.contexts.lock();
        let context = contexts.get_mut(&id).ok_or(SdkCallError::UnknownContext)?;
        Ok(f(context))
    }

    /// Run one contract call inside an existing context.
    ///
    /// Pushes the target's frame, invokes the processor, and pops on all
    /// exit paths.
    fn run_call(
        &self,
        context_id: ContextId,
        contract_name: &str,
        method_name: &str,
        input_arguments: Vec<Argument>,
        calling_service: String,
        calling_permission_scope: PermissionScope,
        access_scope: AccessScope,
    ) -> crate::processor::ProcessCallOutput {
        let permission = match self.processor.get_contract_info(context_id, contract_name) {
            Ok(permission) => permission,
            Err(e) => {
                return crate::processor::ProcessCallOutput {
                    output_arguments: vec![Argument::String(e.to_string())],
                    call_result: ExecutionResult::ErrorUnexpected,
                }
            }
        };

        if self
            .with_context(context_id, |ctx| {
                ctx.stack_push(contract_name.to_string(), permission)
            })
            .is_err()
        {
            return crate::processor::ProcessCallOutput {
                output_arguments: vec![Argument::String("unknown execution context".into())],
                call_result: ExecutionResult::ErrorUnexpected,
            };
        }

        let output = self.processor.process_call(ProcessCallInput {
            context_id,
            contract_name: contract_name.to_string(),
            method_name: method_name.to_string(),
            input_arguments,
            calling_service,
            calling_permission_scope,
            access_scope,
        });

        let _ = self.with_context(context_id, |ctx| ctx.stack_pop());
        output
    }

    /// Execute an ordered transaction set against the committed state at
    /// `height - 1`, producing receipts and the block's state diffs.
    ///
    /// Later transactions observe the writes of earlier successful ones;
    /// a failed transaction's writes are discarded but its receipt is kept.
    #[instrument(skip(self, transactions), fields(height = height.0, count = transactions.len()))]
    pub fn process_transaction_set(
        &self,
        height: BlockHeight,
        transactions: &[SignedTransaction],
    ) -> TransactionSetResult {
        let mut receipts = Vec::with_capacity(transactions.len());
        let mut session_base: HashMap<(String, Vec<u8>), Vec<u8>> = HashMap::new();
        let mut ordered_writes: Vec<(String, Vec<u8>, Vec<u8>)> = Vec::new();

        for tx in transactions {
            let body = &tx.transaction;
            let context_id = self.create_context(
                height,
                AccessScope::ReadWrite,
                Some(body.signer),
                session_base.clone(),
            );

            let output = self.run_call(
                context_id,
                &body.contract_name,
                &body.method_name,
                body.input_arguments.clone(),
                String::new(),
                PermissionScope::Service,
                AccessScope::ReadWrite,
            );

            let context = self.remove_context(context_id);

            if output.is_success() {
                if let Some(context) = context {
                    for diff in context.into_state_diffs() {
                        for record in diff.records {
                            let slot = (diff.contract_name.clone(), record.key.clone());
                            session_base.insert(slot, record.value.clone());
                            ordered_writes.push((
                                diff.contract_name.clone(),
                                record.key,
                                record.value,
                            ));
                        }
                    }
                }
            } else {
                debug!(
                    tx_hash = %tx.hash(),
                    result = %output.call_result,
                    "transaction execution failed"
                );
            }

            receipts.push(TransactionReceipt {
                tx_hash: tx.hash(),
                execution_result: output.call_result,
                output_arguments: output.output_arguments,
            });
        }

        TransactionSetResult {
            receipts,
            state_diffs: collapse_writes(ordered_writes),
        }
    }

    /// Run a read-only method call against committed state.
    ///
    /// Returns the output arguments and the call result; the session never
    /// acquires write access.
    #[instrument(skip(self, call), fields(contract = %call.contract_name, method = %call.method_name))]
    pub fn call_method(&self, call: &Transaction) -> (Vec<Argument>, ExecutionResult) {
        let height = self.state.applied_height();
        let context_id = self.create_context(
            height,
            AccessScope::Read,
            Some(call.signer),
            HashMap::new(),
        );

        let output = self.run_call(
            context_id,
            &call.contract_name,
            &call.method_name,
            call.input_arguments.clone(),
            String::new(),
            PermissionScope::Service,
            AccessScope::Read,
        );

        self.remove_context(context_id);
        (output.output_arguments, output.call_result)
    }

    /// Issue pre-order verdicts for a proposed transaction set.
    ///
    /// Each transaction's envelope signature is verified, then the
    /// pre-order gate contract is consulted under SYSTEM scope.
    #[instrument(skip(self, transactions), fields(height = height.0, count = transactions.len()))]
    pub fn transaction_set_pre_order(
        &self,
        height: BlockHeight,
        transactions: &[SignedTransaction],
    ) -> Vec<PreOrderStatus> {
        transactions
            .iter()
            .map(|tx| {
                if tx.verify_signature().is_err() {
                    return PreOrderStatus::RejectedSignatureMismatch;
                }

                let context_id = self.create_context(
                    height,
                    AccessScope::Read,
                    Some(tx.transaction.signer),
                    HashMap::new(),
                );
                let output = self.run_call(
                    context_id,
                    crate::contracts::GLOBAL_PREORDER_CONTRACT,
                    "approve",
                    vec![Argument::Bytes(tx.hash().as_bytes().to_vec())],
                    String::new(),
                    PermissionScope::System,
                    AccessScope::Read,
                );
                self.remove_context(context_id);

                if output.is_success() {
                    PreOrderStatus::Valid
                } else {
                    PreOrderStatus::RejectedContract
                }
            })
            .collect()
    }
}

/// Collapse an ordered write stream into per-contract diffs: contracts in
/// first-touch order, records in first-write order, final value per key.
fn collapse_writes(ordered: Vec<(String, Vec<u8>, Vec<u8>)>) -> Vec<ContractStateDiff> {
    let mut final_values: HashMap<(String, Vec<u8>), Vec<u8>> = HashMap::new();
    let mut slot_order: Vec<(String, Vec<u8>)> = Vec::new();

    for (contract, key, value) in ordered {
        let slot = (contract, key);
        if !final_values.contains_key(&slot) {
            slot_order.push(slot.clone());
        }
        final_values.insert(slot, value);
    }

    let mut diffs: Vec<ContractStateDiff> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();
    for (contract, key) in slot_order {
        let value = final_values[&(contract.clone(), key.clone())].clone();
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

impl ContractSdkCallHandler for VirtualMachine {
    fn handle_sdk_call(
        &self,
        context_id: ContextId,
        operation: SdkOperation,
        method_name: &str,
        input_arguments: Vec<Argument>,
        _permission_scope: PermissionScope,
    ) -> Result<Vec<Argument>, SdkCallError> {
        match (operation, method_name) {
            (SdkOperation::State, "read") => self.sdk_state_read(context_id, &input_arguments),
            (SdkOperation::State, "write") => self.sdk_state_write(context_id, &input_arguments),
            (SdkOperation::Service, "isNative") => {
                self.sdk_service_is_native(context_id, &input_arguments)
            }
            (SdkOperation::Service, "callMethod") => {
                self.sdk_service_call_method(context_id, &input_arguments)
            }
            (SdkOperation::Address, "getSignerAddress") => self.sdk_signer_address(context_id),
            (operation, method) => Err(SdkCallError::InvalidCall {
                operation: operation.as_str(),
                method: method.to_string(),
                reason: "unknown SDK call".to_string(),
            }),
        }
    }
}

impl VirtualMachine {
    fn sdk_state_read(
        &self,
        context_id: ContextId,
        args: &[Argument],
    ) -> Result<Vec<Argument>, SdkCallError> {
        let Some(key) = args.first().and_then(|a| a.as_bytes()) else {
            return Err(invalid_call(SdkOperation::State, "read", "expects (key: bytes)"));
        };

        let (contract_name, uncommitted) = self.with_context(context_id, |ctx| {
            let (contract_name, _) = ctx.stack_top();
            let uncommitted = ctx.read_visible(&contract_name, key);
            (contract_name, uncommitted)
        })?;

        if contract_name.is_empty() {
            return Err(invalid_call(
                SdkOperation::State,
                "read",
                "no executing contract frame",
            ));
        }

        let value = uncommitted
            .or_else(|| self.state.read(&contract_name, key))
            .unwrap_or_default();
        Ok(vec![Argument::Bytes(value)])
    }

    fn sdk_state_write(
        &self,
        context_id: ContextId,
        args: &[Argument],
    ) -> Result<Vec<Argument>, SdkCallError> {
        let (Some(key), Some(value)) = (
            args.first().and_then(|a| a.as_bytes()),
            args.get(1).and_then(|a| a.as_bytes()),
        ) else {
            return Err(invalid_call(
                SdkOperation::State,
                "write",
                "expects (key: bytes, value: bytes)",
            ));
        };

        self.with_context(context_id, |ctx| {
            if ctx.access_scope != AccessScope::ReadWrite {
                return Err(SdkCallError::WriteInReadScope);
            }
            let (contract_name, _) = ctx.stack_top();
            if contract_name.is_empty() {
                return Err(invalid_call(
                    SdkOperation::State,
                    "write",
                    "no executing contract frame",
                ));
            }
            ctx.record_write(contract_name, key.to_vec(), value.to_vec());
            Ok(())
        })??;

        Ok(vec![])
    }

    fn sdk_service_is_native(
        &self,
        context_id: ContextId,
        args: &[Argument],
    ) -> Result<Vec<Argument>, SdkCallError> {
        let Some(service_name) = args.first().and_then(|a| a.as_str()) else {
            return Err(invalid_call(
                SdkOperation::Service,
                "isNative",
                "expects (serviceName: string)",
            ));
        };

        self.processor
            .get_contract_info(context_id, service_name)
            .map_err(|e| SdkCallError::CallFailed(e.to_string()))?;
        Ok(vec![])
    }

    /// Re-entrant cross-contract call.
    ///
    /// Pushes the callee's frame onto the execution context's stack, calls
    /// the processor with the previous frame as the caller, and pops on all
    /// exit paths.
    fn sdk_service_call_method(
        &self,
        context_id: ContextId,
        args: &[Argument],
    ) -> Result<Vec<Argument>, SdkCallError> {
        let (Some(service_name), Some(method_name), Some(encoded_args)) = (
            args.first().and_then(|a| a.as_str()),
            args.get(1).and_then(|a| a.as_str()),
            args.get(2).and_then(|a| a.as_bytes()),
        ) else {
            return Err(invalid_call(
                SdkOperation::Service,
                "callMethod",
                "expects (serviceName, methodName, inputArgs)",
            ));
        };

        let input_arguments: Vec<Argument> = sbor::basic_decode(encoded_args).map_err(|_| {
            invalid_call(SdkOperation::Service, "callMethod", "corrupt argument array")
        })?;

        let callee_permission = self
            .processor
            .get_contract_info(context_id, service_name)
            .map_err(|e| SdkCallError::CallFailed(e.to_string()))?;

        let (calling_service, calling_permission, access_scope) =
            self.with_context(context_id, |ctx| {
                let (calling_service, calling_permission) = ctx.stack_top();
                let access_scope = ctx.access_scope;
                ctx.stack_push(service_name.to_string(), callee_permission);
                (calling_service, calling_permission, access_scope)
            })?;

        let output = self.processor.process_call(ProcessCallInput {
            context_id,
            contract_name: service_name.to_string(),
            method_name: method_name.to_string(),
            input_arguments,
            calling_service: calling_service.clone(),
            calling_permission_scope: calling_permission,
            access_scope,
        });

        let _ = self.with_context(context_id, |ctx| ctx.stack_pop());

        if !output.is_success() {
            let message = output
                .error_message()
                .unwrap_or("cross-contract call failed")
                .to_string();
            warn!(
                caller = %calling_service,
                callee = %service_name,
                method = %method_name,
                error = %message,
                "Sdk.Service.callMethod failed"
            );
            return Err(SdkCallError::CallFailed(message));
        }

        let encoded = basic_encode(&output.output_arguments)
            .map_err(|_| SdkCallError::CallFailed("output encoding failed".to_string()))?;
        Ok(vec![Argument::Bytes(encoded)])
    }

    fn sdk_signer_address(&self, context_id: ContextId) -> Result<Vec<Argument>, SdkCallError> {
        let signer = self.with_context(context_id, |ctx| ctx.signer)?;
        let Some(signer) = signer else {
            return Err(invalid_call(
                SdkOperation::Address,
                "getSignerAddress",
                "session has no signer",
            ));
        };
        Ok(vec![Argument::Bytes(derive_address(&signer).to_vec())])
    }
}

fn invalid_call(operation: SdkOperation, method: &str, reason: &str) -> SdkCallError {
    SdkCallError::InvalidCall {
        operation: operation.as_str(),
        method: method.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BuiltinCompiler;
    use crate::contracts;
    use orbit_storage_memory::InMemoryStateStore;
    use orbit_types::test_utils::test_keypair;
    use orbit_types::{
        ProtocolVersion, SignedTransaction, TimestampNano, VirtualChainId,
    };

    fn new_vm() -> (Arc<VirtualMachine>, Arc<InMemoryStateStore>) {
        let state = Arc::new(InMemoryStateStore::new());
        let processor = Arc::new(NativeProcessor::new(Arc::new(BuiltinCompiler)));
        let vm = VirtualMachine::new(processor, state.clone() as Arc<dyn StatePersistence>);
        (vm, state)
    }

    fn signed_call(
        seed: u8,
        contract: &str,
        method: &str,
        args: Vec<Argument>,
    ) -> SignedTransaction {
        let keys = test_keypair(seed);
        SignedTransaction::sign(
            Transaction {
                protocol_version: ProtocolVersion(1),
                virtual_chain_id: VirtualChainId(42),
                contract_name: contract.to_string(),
                method_name: method.to_string(),
                input_arguments: args,
                timestamp: TimestampNano(1_000),
                signer: keys.public,
            },
            &keys.private,
        )
    }

    fn apply(state: &InMemoryStateStore, height: u64, result: &TransactionSetResult) {
        state
            .apply(BlockHeight(height), &result.state_diffs)
            .unwrap();
    }

    #[test]
    fn test_deploy_and_invoke_counter() {
        let (vm, state) = new_vm();
        let code = basic_encode(&100u64).unwrap();

        // Deploy
        let deploy = signed_call(
            1,
            contracts::DEPLOYMENTS_CONTRACT,
            "deployService",
            vec![
                Argument::String("CounterExample".into()),
                Argument::Bytes(code),
            ],
        );
        let result = vm.process_transaction_set(BlockHeight(1), &[deploy]);
        assert_eq!(
            result.receipts[0].execution_result,
            ExecutionResult::Success,
            "deploy failed: {:?}",
            result.receipts[0].output_arguments
        );
        apply(&state, 1, &result);

        // get() returns the start value
        let get = signed_call(2, "CounterExample", "get", vec![]);
        let (out, res) = vm.call_method(&get.transaction);
        assert_eq!(res, ExecutionResult::Success);
        assert_eq!(out[0].as_u64(), Some(100));

        // add(17) commits
        let add = signed_call(1, "CounterExample", "add", vec![Argument::Uint64(17)]);
        let result = vm.process_transaction_set(BlockHeight(2), &[add]);
        assert_eq!(result.receipts[0].execution_result, ExecutionResult::Success);
        apply(&state, 2, &result);

        // get() reflects the add
        let (out, res) = vm.call_method(&get.transaction);
        assert_eq!(res, ExecutionResult::Success);
        assert_eq!(out[0].as_u64(), Some(117));
    }

    #[test]
    fn test_token_transfer_moves_balance() {
        let (vm, state) = new_vm();
        let from = test_keypair(1);
        let to = test_keypair(2);
        let to_address = derive_address(&to.public);

        let transfer = signed_call(
            1,
            contracts::BENCHMARK_TOKEN_CONTRACT,
            "transfer",
            vec![Argument::Uint64(250), Argument::Bytes(to_address.to_vec())],
        );
        let result = vm.process_transaction_set(BlockHeight(1), &[transfer]);
        assert_eq!(result.receipts[0].execution_result, ExecutionResult::Success);
        apply(&state, 1, &result);

        let balance_of = |addr: Vec<u8>| {
            let call = signed_call(
                3,
                contracts::BENCHMARK_TOKEN_CONTRACT,
                "getBalance",
                vec![Argument::Bytes(addr)],
            );
            let (out, res) = vm.call_method(&call.transaction);
            assert_eq!(res, ExecutionResult::Success);
            out[0].as_u64().unwrap()
        };

        let from_address = derive_address(&from.public);
        assert_eq!(
            balance_of(from_address.to_vec()),
            contracts::benchmark_token::FAUCET_BALANCE - 250
        );
        assert_eq!(
            balance_of(to_address.to_vec()),
            contracts::benchmark_token::FAUCET_BALANCE + 250
        );
    }

    #[test]
    fn test_overdraft_raises_contract_error() {
        let (vm, _state) = new_vm();
        let to = test_keypair(2);

        let transfer = signed_call(
            1,
            contracts::BENCHMARK_TOKEN_CONTRACT,
            "transfer",
            vec![
                Argument::Uint64(u64::MAX),
                Argument::Bytes(derive_address(&to.public).to_vec()),
            ],
        );
        let result = vm.process_transaction_set(BlockHeight(1), &[transfer]);
        assert_eq!(
            result.receipts[0].execution_result,
            ExecutionResult::ErrorSmartContract
        );
        // Failed transactions leave no state diff behind.
        assert!(result.state_diffs.is_empty());
    }

    #[test]
    fn test_system_method_rejected_from_service_caller() {
        let (vm, _state) = new_vm();

        // _GlobalPreOrder.approve requires SYSTEM; a signed transaction
        // enters at SERVICE permission.
        let call = signed_call(
            1,
            contracts::GLOBAL_PREORDER_CONTRACT,
            "approve",
            vec![Argument::Bytes(vec![0u8; 32])],
        );
        let result = vm.process_transaction_set(BlockHeight(1), &[call]);
        assert_eq!(
            result.receipts[0].execution_result,
            ExecutionResult::ErrorUnexpected
        );
    }

    #[test]
    fn test_unknown_contract_reports_unexpected() {
        let (vm, _state) = new_vm();
        let call = signed_call(1, "NoSuchContract", "frob", vec![]);
        let result = vm.process_transaction_set(BlockHeight(1), &[call]);
        assert_eq!(
            result.receipts[0].execution_result,
            ExecutionResult::ErrorUnexpected
        );
    }

    #[test]
    fn test_write_rejected_in_read_only_call() {
        let (vm, _state) = new_vm();
        let add = signed_call(1, contracts::BENCHMARK_TOKEN_CONTRACT, "transfer", vec![
            Argument::Uint64(1),
            Argument::Bytes(vec![9u8; 20]),
        ]);
        // transfer requires ReadWrite; call_method sessions are Read.
        let (_, res) = vm.call_method(&add.transaction);
        assert_eq!(res, ExecutionResult::ErrorUnexpected);
    }

    #[test]
    fn test_pre_order_verdicts() {
        let (vm, _state) = new_vm();
        let good = signed_call(1, contracts::BENCHMARK_TOKEN_CONTRACT, "transfer", vec![]);
        let mut bad = signed_call(2, contracts::BENCHMARK_TOKEN_CONTRACT, "transfer", vec![]);
        bad.transaction.method_name = "tampered".into();

        let verdicts = vm.transaction_set_pre_order(BlockHeight(1), &[good, bad]);
        assert_eq!(verdicts[0], PreOrderStatus::Valid);
        assert_eq!(verdicts[1], PreOrderStatus::RejectedSignatureMismatch);
    }

    #[test]
    fn test_batch_sees_earlier_writes() {
        let (vm, state) = new_vm();
        let code = basic_encode(&0u64).unwrap();

        let deploy = signed_call(
            1,
            contracts::DEPLOYMENTS_CONTRACT,
            "deployService",
            vec![Argument::String("CounterB".into()), Argument::Bytes(code)],
        );
        let add1 = signed_call(1, "CounterB", "add", vec![Argument::Uint64(5)]);
        let add2 = signed_call(2, "CounterB", "add", vec![Argument::Uint64(7)]);

        // Deploy and both adds in one set: add2 must see add1's write.
        let result = vm.process_transaction_set(BlockHeight(1), &[deploy, add1, add2]);
        for receipt in &result.receipts {
            assert_eq!(receipt.execution_result, ExecutionResult::Success);
        }
        apply(&state, 1, &result);

        let get = signed_call(3, "CounterB", "get", vec![]);
        let (out, _) = vm.call_method(&get.transaction);
        assert_eq!(out[0].as_u64(), Some(12));
    }
}
