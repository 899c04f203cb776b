//! The deterministic multi-node runner.

use crate::event_queue::EventKey;
use orbit_core::{Action, Event, StateMachine, TimerId};
use orbit_mempool::{SubmitError, TransactionSubmission};
use orbit_node::{NodeConfig, NodeStateMachine};
use orbit_storage_memory::{InMemoryBlockStore, InMemoryStateStore};
use orbit_types::{
    Argument, BlockHeight, ExecutionResult, Hash, SignedTransaction, TimestampNano, Transaction,
    TransactionReceipt, ValidatorId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Uniform one-way delivery latency.
    pub latency: Duration,
    /// Virtual clock at start.
    pub start_time: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(10),
            start_time: Duration::from_secs(1),
        }
    }
}

struct SimNode {
    machine: NodeStateMachine,
    /// Latest armed deadline per timer id; stale firings are skipped.
    timers: HashMap<TimerId, Duration>,
    /// Receipts delivered via `NotifyTransactionResults`, for assertions.
    committed_receipts: Vec<(BlockHeight, TransactionReceipt)>,
    /// Offline nodes neither receive nor emit network traffic.
    offline: bool,
}

/// A deterministic in-process network of complete nodes.
pub struct SimNetwork {
    nodes: Vec<SimNode>,
    queue: BTreeMap<EventKey, Event>,
    now: Duration,
    sequence: u64,
    config: SimConfig,
}

impl SimNetwork {
    /// Build a network from per-node configs and signing keys.
    ///
    /// Node `i` runs as the federation member `configs[i].local_id`;
    /// startup actions (timers) are armed immediately.
    pub fn new(setups: Vec<(NodeConfig, orbit_types::PrivateKey)>, config: SimConfig) -> Self {
        let start_time = config.start_time;
        let initial_timestamp = TimestampNano::from_duration(start_time);

        let mut network = Self {
            nodes: Vec::new(),
            queue: BTreeMap::new(),
            now: start_time,
            sequence: 0,
            config,
        };

        for (node_config, signing_key) in setups {
            let machine = NodeStateMachine::new(
                node_config,
                signing_key,
                Arc::new(InMemoryBlockStore::new()),
                Arc::new(InMemoryStateStore::new()),
                initial_timestamp,
            );
            network.nodes.push(SimNode {
                machine,
                timers: HashMap::new(),
                committed_receipts: Vec::new(),
                offline: false,
            });
        }

        for index in 0..network.nodes.len() {
            let actions = network.nodes[index].machine.startup_actions();
            network.process_actions(index, actions);
        }
        network
    }

    /// The virtual clock.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// The virtual clock as a transaction timestamp.
    pub fn timestamp(&self) -> TimestampNano {
        TimestampNano::from_duration(self.now)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the network is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Take a node offline (drops traffic both ways) or back online.
    pub fn set_offline(&mut self, index: usize, offline: bool) {
        self.nodes[index].offline = offline;
    }

    /// The committed tip of a node.
    pub fn committed_height(&self, index: usize) -> BlockHeight {
        self.nodes[index].machine.last_committed_height()
    }

    /// A committed block pair at a node.
    pub fn block_at(&self, index: usize, height: BlockHeight) -> Option<orbit_types::BlockPair> {
        self.nodes[index].machine.block_at(height)
    }

    /// Receipts a node's result handlers saw, in commit order.
    pub fn committed_receipts(&self, index: usize) -> &[(BlockHeight, TransactionReceipt)] {
        &self.nodes[index].committed_receipts
    }

    /// Submit a client transaction at a node, executing the pool's actions.
    pub fn submit_transaction(
        &mut self,
        index: usize,
        tx: SignedTransaction,
    ) -> Result<TransactionSubmission, SubmitError> {
        self.nodes[index].machine.set_time(self.now);
        let (result, actions) = self.nodes[index].machine.submit_transaction(tx);
        self.process_actions(index, actions);
        result
    }

    /// A node's view of a transaction.
    pub fn transaction_status(&self, index: usize, hash: &Hash) -> TransactionSubmission {
        self.nodes[index].machine.get_transaction_status(hash)
    }

    /// Run a read-only call at a node.
    pub fn call_method(
        &self,
        index: usize,
        call: &Transaction,
    ) -> (Vec<Argument>, ExecutionResult, BlockHeight) {
        self.nodes[index].machine.call_method(call)
    }

    fn schedule(&mut self, node_index: usize, at: Duration, event: Event) {
        let key = EventKey {
            time: at,
            priority: event.priority(),
            node_index: node_index as u32,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.queue.insert(key, event);
    }

    fn peer_index(&self, peer: ValidatorId) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.machine.local_id() == peer)
    }

    fn process_actions(&mut self, node_index: usize, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broadcast { message } => {
                    if self.nodes[node_index].offline {
                        continue;
                    }
                    let deliver_at = self.now + self.config.latency;
                    for peer in 0..self.nodes.len() {
                        if peer == node_index || self.nodes[peer].offline {
                            continue;
                        }
                        self.schedule(peer, deliver_at, message.clone().into_received_event());
                    }
                }

                Action::Unicast { peer, message } => {
                    if self.nodes[node_index].offline {
                        continue;
                    }
                    let Some(peer_index) = self.peer_index(peer) else {
                        trace!(%peer, "dropping unicast to unknown peer");
                        continue;
                    };
                    if self.nodes[peer_index].offline {
                        continue;
                    }
                    let deliver_at = self.now + self.config.latency;
                    self.schedule(peer_index, deliver_at, message.into_received_event());
                }

                Action::SetTimer { id, duration } => {
                    let deadline = self.now + duration;
                    self.nodes[node_index].timers.insert(id, deadline);
                    self.schedule(node_index, deadline, id.into_event());
                }

                Action::EnqueueInternal { event } => {
                    self.schedule(node_index, self.now, event);
                }

                Action::NotifyTransactionResults {
                    receipts,
                    block_height,
                    ..
                } => {
                    let log = &mut self.nodes[node_index].committed_receipts;
                    for receipt in receipts {
                        log.push((block_height, receipt));
                    }
                }
            }
        }
    }

    /// Process one queued event. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some((&key, _)) = self.queue.iter().next() else {
            return false;
        };
        let event = self.queue.remove(&key).expect("key just observed");
        self.now = self.now.max(key.time);

        let node_index = key.node_index as usize;

        // A replaced timer leaves its old firing in the queue; skip it.
        if let Some(timer_id) = timer_id_of(&event) {
            let armed = self.nodes[node_index].timers.get(&timer_id).copied();
            if armed != Some(key.time) {
                return true;
            }
            self.nodes[node_index].timers.remove(&timer_id);
        }

        self.nodes[node_index].machine.set_time(self.now);
        let actions = self.nodes[node_index].machine.handle(event);
        self.process_actions(node_index, actions);
        true
    }

    /// Run until `predicate` holds or the virtual clock passes `deadline`.
    ///
    /// Returns whether the predicate held.
    pub fn run_until(
        &mut self,
        deadline: Duration,
        mut predicate: impl FnMut(&SimNetwork) -> bool,
    ) -> bool {
        loop {
            if predicate(self) {
                return true;
            }
            if self.now > deadline {
                return false;
            }
            if !self.step() {
                return predicate(self);
            }
        }
    }

    /// Run until every node's committed tip reaches `height`.
    pub fn run_until_height(&mut self, height: BlockHeight, deadline: Duration) -> bool {
        self.run_until(deadline, |net| {
            (0..net.len()).all(|i| net.committed_height(i) >= height)
        })
    }
}

fn timer_id_of(event: &Event) -> Option<TimerId> {
    match event {
        Event::ProposalTimer => Some(TimerId::Proposal),
        Event::PendingSweepTimer => Some(TimerId::PendingSweep),
        Event::CommittedSweepTimer => Some(TimerId::CommittedSweep),
        Event::SyncRoundTimer => Some(TimerId::SyncRound),
        _ => None,
    }
}
