//! Node state machine.

use crate::config::NodeConfig;
use crate::sync::BlockSyncState;
use orbit_consensus::{build_algorithm, ConsensusAlgorithm, ConsensusContext};
use orbit_core::{Action, Event, OutboundMessage, StateMachine};
use orbit_engine::{BuiltinCompiler, NativeProcessor, VirtualMachine};
use orbit_mempool::{MempoolState, SubmitError, TransactionSubmission};
use orbit_messages::{
    BlockAvailabilityRequest, BlockAvailabilityResponse, BlockSyncRequest, BlockSyncResponse,
};
use orbit_metrics as metrics;
use orbit_storage::{BlockPersistence, StatePersistence};
use orbit_types::{
    Argument, BlockHeight, ExecutionResult, Hash, PrivateKey, SignedTransaction, TimestampNano,
    Transaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Combined node state machine.
///
/// Composes the transaction pool, the consensus algorithm, and the block
/// sync driver over shared block and state storage, and answers the sync
/// protocol's source side from the block store.
///
/// Client-facing request/response operations (submission, receipt lookup,
/// read-only calls) are direct methods; runners own the channels that
/// deliver them and execute the returned actions.
pub struct NodeStateMachine {
    config: NodeConfig,

    /// Transaction pool.
    mempool: MempoolState,

    /// Consensus algorithm (the benchmark variant unless configured
    /// otherwise).
    consensus: Box<dyn ConsensusAlgorithm>,

    /// Block sync driver (petitioner side).
    sync: BlockSyncState,

    /// Committed block pair log. Shared with the sync source responder.
    block_store: Arc<dyn BlockPersistence>,

    /// The execution engine, also serving read-only client calls.
    vm: Arc<VirtualMachine>,

    /// Current time.
    now: Duration,
}

impl NodeStateMachine {
    /// Wire a node over its storage backends.
    pub fn new(
        config: NodeConfig,
        signing_key: PrivateKey,
        block_store: Arc<dyn BlockPersistence>,
        state_store: Arc<dyn StatePersistence>,
        initial_timestamp: TimestampNano,
    ) -> Self {
        let processor = Arc::new(NativeProcessor::new(Arc::new(BuiltinCompiler)));
        let vm = VirtualMachine::new(processor, Arc::clone(&state_store));

        let mempool = MempoolState::new(
            config.local_id,
            config.virtual_chain_id,
            config.mempool.clone(),
            initial_timestamp,
        );

        let consensus = build_algorithm(
            config.consensus.clone(),
            config.local_id,
            config.federation.clone(),
            signing_key,
            ConsensusContext::new(Arc::clone(&vm), config.virtual_chain_id),
            Arc::clone(&block_store),
            state_store,
        );

        let sync = BlockSyncState::new(config.local_id, config.sync.clone());

        Self {
            config,
            mempool,
            consensus,
            sync,
            block_store,
            vm,
            now: Duration::ZERO,
        }
    }

    /// Actions to execute at startup: sweeper timers, the leader's
    /// proposal timer, the sync idle timer.
    pub fn startup_actions(&self) -> Vec<Action> {
        let mut actions = self.mempool.startup_actions();
        actions.extend(self.consensus.startup_actions());
        actions.extend(self.sync.startup_actions());
        actions
    }

    /// This node's federation position.
    pub fn local_id(&self) -> orbit_types::ValidatorId {
        self.config.local_id
    }

    /// The committed tip height.
    pub fn last_committed_height(&self) -> BlockHeight {
        self.block_store.last_committed_height()
    }

    /// A committed block pair, if the height is within the chain.
    pub fn block_at(&self, height: BlockHeight) -> Option<orbit_types::BlockPair> {
        self.block_store.block_at(height)
    }

    /// The transaction pool (observability and tests).
    pub fn mempool(&self) -> &MempoolState {
        &self.mempool
    }

    /// The block sync driver (observability and tests).
    pub fn sync(&self) -> &BlockSyncState {
        &self.sync
    }

    // ═══════════════════════════════════════════════════════════════════
    // Client surface
    // ═══════════════════════════════════════════════════════════════════

    /// Submit a client transaction into the pool.
    ///
    /// The returned actions (the relay broadcast) must be executed by the
    /// runner even when the caller only cares about the submission result.
    pub fn submit_transaction(
        &mut self,
        tx: SignedTransaction,
    ) -> (Result<TransactionSubmission, SubmitError>, Vec<Action>) {
        match self.mempool.on_submit_transaction(tx) {
            Ok((submission, actions)) => (Ok(submission), actions),
            Err(e) => (Err(e), vec![]),
        }
    }

    /// Look up a transaction's committed receipt or pending status.
    pub fn get_transaction_status(&self, hash: &Hash) -> TransactionSubmission {
        self.mempool.get_committed_receipt(hash)
    }

    /// Run a read-only contract call against committed state.
    pub fn call_method(&self, call: &Transaction) -> (Vec<Argument>, ExecutionResult, BlockHeight) {
        let (output, result) = self.vm.call_method(call);
        (output, result, self.block_store.last_committed_height())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Sync: source side
    // ═══════════════════════════════════════════════════════════════════

    /// Answer a petitioner's availability broadcast.
    ///
    /// Replies iff the petitioner is behind us, advertising `[1, tip]`.
    fn on_availability_request(&self, request: BlockAvailabilityRequest) -> Vec<Action> {
        if request.sender == self.config.local_id {
            return vec![];
        }
        let local_last = self.block_store.last_committed_height();
        if local_last <= request.last_committed_height {
            return vec![];
        }

        debug!(
            petitioner = %request.sender,
            tip = local_last.0,
            "answering block availability request"
        );
        vec![Action::Unicast {
            peer: request.sender,
            message: OutboundMessage::BlockAvailabilityResponse(BlockAvailabilityResponse {
                sender: self.config.local_id,
                first_available: BlockHeight(1),
                last_available: local_last,
                last_committed_height: local_last,
            }),
        }]
    }

    /// Serve a chunk request, clamped to the configured batch size.
    fn on_sync_request(&self, request: BlockSyncRequest) -> Vec<Action> {
        let local_last = self.block_store.last_committed_height();
        if request.first_height >= local_last {
            warn!(
                petitioner = %request.sender,
                first = request.first_height.0,
                tip = local_last.0,
                "rejecting sync request at or above our tip"
            );
            return vec![];
        }

        let batch = self.config.sync.batch_size;
        let clamped_last = BlockHeight(
            request
                .last_height
                .0
                .min(request.first_height.0 + batch - 1),
        );
        let block_pairs =
            self.block_store
                .blocks_in_range(request.first_height, clamped_last, batch as usize);
        if block_pairs.is_empty() {
            return vec![];
        }

        let first_height = block_pairs[0].height();
        let last_height = block_pairs[block_pairs.len() - 1].height();
        debug!(
            petitioner = %request.sender,
            first = first_height.0,
            last = last_height.0,
            "serving block chunk"
        );
        vec![Action::Unicast {
            peer: request.sender,
            message: OutboundMessage::BlockSyncResponse(Box::new(BlockSyncResponse {
                sender: self.config.local_id,
                first_height,
                last_height,
                block_pairs,
            })),
        }]
    }

    /// Commit a received chunk strictly in height order.
    ///
    /// Any gap or validation failure aborts the batch; already-committed
    /// prefixes stand and the next round re-requests from the new tip.
    fn apply_sync_chunk(&mut self, response: BlockSyncResponse) -> Vec<Action> {
        let Some(block_pairs) = self.sync.on_sync_response(response) else {
            return vec![];
        };

        let mut actions = Vec::new();
        let mut applied = 0usize;
        for pair in block_pairs {
            match self.consensus.commit_synced_block(pair) {
                Ok(commit_actions) => {
                    actions.extend(commit_actions);
                    applied += 1;
                }
                Err(e) => {
                    warn!(error = %e, applied, "aborting sync chunk");
                    actions.extend(self.sync.on_chunk_failed());
                    return actions;
                }
            }
        }

        actions.extend(self.sync.on_chunk_applied(applied));
        actions
    }

    /// Fan a local commit out to every interested subsystem.
    fn on_block_committed(&mut self, block: orbit_types::BlockPair) -> Vec<Action> {
        let height = block.height();
        let timestamp = block.timestamp();

        // Pool first: waiters and ordering validation key off its height.
        let mut actions = self.mempool.commit_transaction_receipts(
            height,
            timestamp,
            block.results_block.receipts.clone(),
        );
        actions.extend(self.consensus.on_block_committed(height, &self.mempool));
        actions.extend(self.sync.on_block_committed(height));
        actions
    }
}

impl StateMachine for NodeStateMachine {
    #[instrument(skip(self, event), fields(
        node = %self.config.local_id,
        event = %event.type_name(),
        height = self.block_store.last_committed_height().0,
    ))]
    fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            // Timers
            Event::ProposalTimer => self.consensus.on_proposal_timer(&mut self.mempool),
            Event::PendingSweepTimer => self.mempool.on_pending_sweep(),
            Event::CommittedSweepTimer => self.mempool.on_committed_sweep(),
            Event::SyncRoundTimer => self
                .sync
                .on_sync_timer(self.block_store.last_committed_height()),

            // Mempool
            Event::TransactionsForwarded { message } => {
                self.mempool.on_forwarded_transactions(message)
            }

            // Consensus
            Event::BlockProposalReceived { proposal } => {
                self.consensus.on_block_proposal(*proposal, &self.mempool)
            }
            Event::BlockVoteReceived { vote } => self.consensus.on_block_vote(vote),
            Event::BlockCommitReceived { commit } => {
                self.consensus.on_block_commit(*commit, &self.mempool)
            }

            // Sync: source side
            Event::BlockAvailabilityRequestReceived { request } => {
                self.on_availability_request(request)
            }
            Event::BlockSyncRequestReceived { request } => self.on_sync_request(request),

            // Sync: petitioner side
            Event::BlockAvailabilityResponseReceived { response } => {
                self.sync.on_availability_response(response);
                vec![]
            }
            Event::BlockSyncResponseReceived { response } => self.apply_sync_chunk(*response),

            // Internal fan-out
            Event::BlockCommitted { block } => self.on_block_committed(*block),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
        self.mempool.set_time(now);
        self.consensus.set_time(now);
        metrics::set_block_height(self.block_store.last_committed_height().0);
    }

    fn now(&self) -> Duration {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbit_storage_memory::{InMemoryBlockStore, InMemoryStateStore};
    use orbit_types::test_utils::{test_keypair, test_transaction};
    use orbit_types::{Federation, TransactionStatus, ValidatorId, VirtualChainId};

    fn new_node(id: u32, federation_size: u8) -> NodeStateMachine {
        let keys: Vec<_> = (0..federation_size).map(|i| test_keypair(i + 1)).collect();
        let federation = Federation::new(keys.iter().map(|k| k.public).collect());
        let config = NodeConfig::new(ValidatorId(id), VirtualChainId(42), federation);
        let mut node = NodeStateMachine::new(
            config,
            test_keypair(id as u8 + 1).private,
            Arc::new(InMemoryBlockStore::new()),
            Arc::new(InMemoryStateStore::new()),
            TimestampNano(0),
        );
        node.set_time(Duration::from_secs(1));
        node
    }

    #[test]
    fn test_startup_arms_all_timers() {
        let node = new_node(0, 2);
        let timer_count = node
            .startup_actions()
            .iter()
            .filter(|a| matches!(a, Action::SetTimer { .. }))
            .count();
        // Two sweepers + proposal (leader) + sync round.
        assert_eq!(timer_count, 4);

        let validator = new_node(1, 2);
        let timer_count = validator
            .startup_actions()
            .iter()
            .filter(|a| matches!(a, Action::SetTimer { .. }))
            .count();
        // Validators do not arm the proposal timer.
        assert_eq!(timer_count, 3);
    }

    #[test]
    fn test_submit_and_lookup() {
        let mut node = new_node(0, 2);
        let tx = test_transaction(1);

        let (result, actions) = node.submit_transaction(tx.clone());
        assert_eq!(result.unwrap().status, TransactionStatus::Pending);
        assert_eq!(actions.len(), 1);

        let status = node.get_transaction_status(&tx.hash());
        assert_eq!(status.status, TransactionStatus::Pending);
    }

    #[test]
    fn test_single_node_end_to_end_commit() {
        let mut node = new_node(0, 1);
        let tx = test_transaction(1);
        node.submit_transaction(tx.clone()).0.unwrap();

        // Proposal timer on a single-node federation commits immediately;
        // drain the internal commit event like a runner would.
        let actions = node.handle(Event::ProposalTimer);
        let mut queue: Vec<Event> = actions
            .into_iter()
            .filter_map(|a| match a {
                Action::EnqueueInternal { event } => Some(event),
                _ => None,
            })
            .collect();
        while let Some(event) = queue.pop() {
            for action in node.handle(event) {
                if let Action::EnqueueInternal { event } = action {
                    queue.push(event);
                }
            }
        }

        assert_eq!(node.last_committed_height(), BlockHeight(1));
        let status = node.get_transaction_status(&tx.hash());
        assert_eq!(status.status, TransactionStatus::Committed);
        assert_eq!(status.receipt.unwrap().tx_hash, tx.hash());
    }

    #[test]
    fn test_availability_request_answered_only_when_ahead() {
        let node = new_node(0, 2);
        // Both at height 0: no answer.
        let actions = node.on_availability_request(BlockAvailabilityRequest {
            sender: ValidatorId(1),
            first_height: BlockHeight(1),
            last_height: BlockHeight(10),
            last_committed_height: BlockHeight(0),
        });
        assert!(actions.is_empty());
    }

    #[test]
    fn test_sync_request_rejected_at_tip() {
        let node = new_node(0, 2);
        let actions = node.on_sync_request(BlockSyncRequest {
            sender: ValidatorId(1),
            first_height: BlockHeight(1),
            last_height: BlockHeight(10),
        });
        assert!(actions.is_empty());
    }
}
