//! The pinned node event loop.
//!
//! [`NodeLoop`] runs on a dedicated `std::thread` and owns the node state
//! machine exclusively. It drains three crossbeam channels with a priority
//! cascade - timers, then network events, then client requests - executes
//! the actions each step returns, and publishes commit progress to the
//! block tracker and the transaction waiter.

use crate::outbound::send_outbound;
use crate::timers::TimerManager;
use crate::tracker::{BlockTracker, BlockTrackerHandle, TrackerConfig};
use crate::waiter::TransactionWaiter;
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use orbit_core::{Action, Event, StateMachine};
use orbit_mempool::{SubmitError, TransactionSubmission};
use orbit_network::Transport;
use orbit_node::{register_gossip_handlers, NodeStateMachine};
use orbit_types::{
    Argument, BlockHeight, ExecutionResult, Hash, SignedTransaction, Transaction,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Client-side inputs delivered through the loop's request channel.
pub enum LoopInput {
    /// Submit a signed transaction into the pool.
    SubmitTransaction {
        /// The transaction.
        tx: SignedTransaction,
        /// Where the submission outcome goes.
        respond_to: oneshot::Sender<Result<TransactionSubmission, SubmitError>>,
    },

    /// Look up a transaction's status/receipt.
    GetTransactionStatus {
        /// The canonical transaction hash.
        tx_hash: Hash,
        /// Where the answer goes.
        respond_to: oneshot::Sender<TransactionSubmission>,
    },

    /// Run a read-only contract call.
    CallMethod {
        /// The call body.
        call: Box<Transaction>,
        /// Where the output goes.
        respond_to: oneshot::Sender<(Vec<Argument>, ExecutionResult, BlockHeight)>,
    },
}

/// Get wall-clock time as a duration since the UNIX epoch.
fn wall_clock() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
}

/// The event loop. Constructed by [`NodeLoop::spawn`], which also returns
/// the [`LoopHandle`] clients use.
pub struct NodeLoop<T: Transport + 'static> {
    node: NodeStateMachine,
    transport: Arc<T>,
    timers: TimerManager,
    timer_rx: Receiver<Event>,
    network_rx: Receiver<Event>,
    client_rx: Receiver<LoopInput>,
    shutdown_rx: Receiver<()>,
    waiter: Arc<TransactionWaiter>,
    tracker: BlockTrackerHandle,
}

impl<T: Transport + 'static> NodeLoop<T> {
    /// Wire the loop, register gossip handlers, and start the pinned
    /// thread.
    pub fn spawn(
        node: NodeStateMachine,
        transport: Arc<T>,
        tokio_handle: tokio::runtime::Handle,
        tracker_config: TrackerConfig,
    ) -> LoopHandle {
        let (timer_tx, timer_rx) = crossbeam::channel::unbounded();
        let (network_tx, network_rx) = crossbeam::channel::unbounded();
        let (client_tx, client_rx) = crossbeam::channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded(1);

        register_gossip_handlers(transport.as_ref(), node.local_id(), network_tx);

        let waiter = Arc::new(TransactionWaiter::new());
        let (tracker_handle, tracker) =
            BlockTracker::new(node.last_committed_height(), tracker_config);

        let timers = TimerManager::new(tokio_handle, timer_tx);
        let node_loop = NodeLoop {
            node,
            transport,
            timers,
            timer_rx,
            network_rx,
            client_rx,
            shutdown_rx,
            waiter: Arc::clone(&waiter),
            tracker: tracker_handle,
        };

        let join = std::thread::Builder::new()
            .name("orbit-node-loop".to_string())
            .spawn(move || node_loop.run())
            .expect("node loop thread spawn failed");

        LoopHandle {
            client_tx,
            shutdown_tx,
            join: parking_lot::Mutex::new(Some(join)),
            waiter,
            tracker,
        }
    }

    /// Drive the loop until shutdown. Blocks the calling thread.
    fn run(mut self) {
        info!("node loop starting");
        let startup = self.node.startup_actions();
        let mut internal = VecDeque::new();
        self.execute_actions(startup, &mut internal);
        self.drain_internal(&mut internal);

        let timer_rx = self.timer_rx.clone();
        let network_rx = self.network_rx.clone();
        let client_rx = self.client_rx.clone();
        let shutdown_rx = self.shutdown_rx.clone();

        loop {
            // Priority cascade: timers before network before client work.
            if let Ok(event) = timer_rx.try_recv() {
                self.process_event(event);
                continue;
            }
            if let Ok(event) = network_rx.try_recv() {
                self.process_event(event);
                continue;
            }
            match client_rx.try_recv() {
                Ok(input) => {
                    self.process_input(input);
                    continue;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => break,
            }

            crossbeam::select! {
                recv(timer_rx) -> event => match event {
                    Ok(event) => self.process_event(event),
                    Err(_) => break,
                },
                recv(network_rx) -> event => match event {
                    Ok(event) => self.process_event(event),
                    Err(_) => break,
                },
                recv(client_rx) -> input => match input {
                    Ok(input) => self.process_input(input),
                    Err(_) => break,
                },
                recv(shutdown_rx) -> _ => {
                    info!("node loop received shutdown signal");
                    break;
                }
            }
        }
        info!("node loop stopped");
    }

    fn process_event(&mut self, event: Event) {
        self.node.set_time(wall_clock());
        let mut internal = VecDeque::new();
        internal.push_back(event);
        self.drain_internal(&mut internal);
        self.tracker.advance(self.node.last_committed_height());
    }

    fn drain_internal(&mut self, queue: &mut VecDeque<Event>) {
        while let Some(event) = queue.pop_front() {
            let actions = self.node.handle(event);
            self.execute_actions(actions, queue);
        }
    }

    fn process_input(&mut self, input: LoopInput) {
        match input {
            LoopInput::SubmitTransaction { tx, respond_to } => {
                self.node.set_time(wall_clock());
                let (result, actions) = self.node.submit_transaction(tx);
                let mut internal = VecDeque::new();
                self.execute_actions(actions, &mut internal);
                self.drain_internal(&mut internal);
                let _ = respond_to.send(result);
            }
            LoopInput::GetTransactionStatus {
                tx_hash,
                respond_to,
            } => {
                let _ = respond_to.send(self.node.get_transaction_status(&tx_hash));
            }
            LoopInput::CallMethod { call, respond_to } => {
                let _ = respond_to.send(self.node.call_method(&call));
            }
        }
    }

    fn execute_actions(&mut self, actions: Vec<Action>, internal: &mut VecDeque<Event>) {
        for action in actions {
            match action {
                Action::Broadcast { message } => {
                    send_outbound(self.transport.as_ref(), self.node.local_id(), None, message);
                }
                Action::Unicast { peer, message } => {
                    send_outbound(
                        self.transport.as_ref(),
                        self.node.local_id(),
                        Some(peer),
                        message,
                    );
                }
                Action::SetTimer { id, duration } => {
                    self.timers.set_timer(id, duration);
                }
                Action::EnqueueInternal { event } => {
                    internal.push_back(event);
                }
                Action::NotifyTransactionResults {
                    receipts,
                    block_height,
                    block_timestamp,
                } => {
                    self.waiter
                        .notify_committed(&receipts, block_height, block_timestamp);
                }
            }
        }
    }
}

/// Client-side handle over a running node loop.
pub struct LoopHandle {
    client_tx: Sender<LoopInput>,
    shutdown_tx: Sender<()>,
    join: parking_lot::Mutex<Option<std::thread::JoinHandle<()>>>,
    waiter: Arc<TransactionWaiter>,
    tracker: BlockTracker,
}

impl LoopHandle {
    /// The commit-notification registry.
    pub fn waiter(&self) -> &Arc<TransactionWaiter> {
        &self.waiter
    }

    /// The block tracker.
    pub fn tracker(&self) -> &BlockTracker {
        &self.tracker
    }

    /// Submit a transaction and await the pool's answer.
    pub async fn submit_transaction(
        &self,
        tx: SignedTransaction,
    ) -> Result<TransactionSubmission, SubmitError> {
        let (respond_to, rx) = oneshot::channel();
        if self
            .client_tx
            .send(LoopInput::SubmitTransaction { tx, respond_to })
            .is_err()
        {
            warn!("node loop gone; rejecting submission");
            return Err(SubmitError::Congestion);
        }
        rx.await.unwrap_or(Err(SubmitError::Congestion))
    }

    /// Look up a transaction's status/receipt.
    pub async fn get_transaction_status(&self, tx_hash: Hash) -> Option<TransactionSubmission> {
        let (respond_to, rx) = oneshot::channel();
        self.client_tx
            .send(LoopInput::GetTransactionStatus {
                tx_hash,
                respond_to,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Run a read-only contract call.
    pub async fn call_method(
        &self,
        call: Transaction,
    ) -> Option<(Vec<Argument>, ExecutionResult, BlockHeight)> {
        let (respond_to, rx) = oneshot::channel();
        self.client_tx
            .send(LoopInput::CallMethod {
                call: Box::new(call),
                respond_to,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Stop the loop and join its thread.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.lock().take() {
            let _ = join.join();
        }
    }
}
