//! Block sync driver: the petitioner's state machine.
//!
//! A lagging node catches up by pulling block ranges from peers:
//!
//! ```text
//! Idle ──(no commit within interval)──► CollectingAvailability
//!   ▲                                        │ (collect timeout)
//!   │                                        ▼
//!   └──(chunk applied / failure / timeout)── WaitingForChunks
//! ```
//!
//! One timer (`TimerId::SyncRound`) drives every phase transition; commits
//! observed while idle reset it. The machine validates nothing about block
//! contents - chunks are handed back to the node, which commits them
//! strictly in height order through the consensus commit path and reports
//! the outcome.

use orbit_core::{Action, OutboundMessage, TimerId};
use orbit_messages::{BlockAvailabilityRequest, BlockAvailabilityResponse, BlockSyncRequest,
    BlockSyncResponse};
use orbit_metrics as metrics;
use serde::Deserialize;
use orbit_types::{BlockHeight, BlockPair, ValidatorId};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Sync driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// How long the chain may stand still before a sync round starts.
    #[serde(default = "default_no_commit_interval", with = "serde_millis")]
    pub no_commit_interval: Duration,

    /// How long availability responses are collected.
    #[serde(default = "default_collect_timeout", with = "serde_millis")]
    pub collect_response_timeout: Duration,

    /// How long to wait for a requested chunk.
    #[serde(default = "default_chunk_timeout", with = "serde_millis")]
    pub chunk_wait_timeout: Duration,

    /// Blocks requested (and served) per chunk.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

fn default_no_commit_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_collect_timeout() -> Duration {
    Duration::from_millis(500)
}

fn default_chunk_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_batch_size() -> u64 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            no_commit_interval: default_no_commit_interval(),
            collect_response_timeout: default_collect_timeout(),
            chunk_wait_timeout: default_chunk_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

mod serde_millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// The driver's phase.
#[derive(Debug)]
pub enum SyncPhase {
    /// Nothing in flight; the chain is (presumed) advancing by consensus.
    Idle,

    /// A round is open: availability responses are being collected.
    CollectingAvailability {
        /// Responses received so far, in arrival order.
        responses: Vec<BlockAvailabilityResponse>,
    },

    /// A chunk request is out to a chosen source.
    WaitingForChunks {
        /// The source we asked.
        source: ValidatorId,
        /// First height we asked for.
        first_height: BlockHeight,
    },
}

/// The petitioner state machine.
pub struct BlockSyncState {
    config: SyncConfig,
    local_id: ValidatorId,
    phase: SyncPhase,
}

impl BlockSyncState {
    /// Create the driver, idle.
    pub fn new(local_id: ValidatorId, config: SyncConfig) -> Self {
        Self {
            config,
            local_id,
            phase: SyncPhase::Idle,
        }
    }

    /// The current phase (observability and tests).
    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    /// Arm the idle timer. Called once at startup.
    pub fn startup_actions(&self) -> Vec<Action> {
        vec![self.set_round_timer(self.config.no_commit_interval)]
    }

    fn set_round_timer(&self, duration: Duration) -> Action {
        Action::SetTimer {
            id: TimerId::SyncRound,
            duration,
        }
    }

    fn to_idle(&mut self) -> Vec<Action> {
        self.phase = SyncPhase::Idle;
        vec![self.set_round_timer(self.config.no_commit_interval)]
    }

    /// The round timer fired; advance whatever phase is current.
    #[instrument(skip(self), fields(last_committed = last_committed.0))]
    pub fn on_sync_timer(&mut self, last_committed: BlockHeight) -> Vec<Action> {
        match std::mem::replace(&mut self.phase, SyncPhase::Idle) {
            SyncPhase::Idle => {
                // No commit within the interval: open a round.
                metrics::record_sync_round_started();
                let first_height = last_committed.next();
                let last_height = BlockHeight(last_committed.0 + self.config.batch_size);
                info!(
                    first = first_height.0,
                    last = last_height.0,
                    "broadcasting block availability request"
                );
                self.phase = SyncPhase::CollectingAvailability { responses: vec![] };
                vec![
                    Action::Broadcast {
                        message: OutboundMessage::BlockAvailabilityRequest(
                            BlockAvailabilityRequest {
                                sender: self.local_id,
                                first_height,
                                last_height,
                                last_committed_height: last_committed,
                            },
                        ),
                    },
                    self.set_round_timer(self.config.collect_response_timeout),
                ]
            }

            SyncPhase::CollectingAvailability { responses } => {
                // Collection finished; pick a source and request the chunk.
                let first_height = last_committed.next();
                let candidates = responses
                    .iter()
                    .filter(|r| r.last_available >= first_height);

                // Furthest tip wins; the first responder breaks ties.
                let mut chosen: Option<&BlockAvailabilityResponse> = None;
                for candidate in candidates {
                    match chosen {
                        Some(best) if candidate.last_committed_height <= best.last_committed_height => {}
                        _ => chosen = Some(candidate),
                    }
                }

                let Some(source) = chosen else {
                    debug!(
                        responses = responses.len(),
                        "no usable availability responses"
                    );
                    return self.to_idle();
                };

                let last_height = BlockHeight(last_committed.0 + self.config.batch_size);
                info!(
                    source = %source.sender,
                    first = first_height.0,
                    last = last_height.0,
                    "requesting block chunk"
                );
                let request = Action::Unicast {
                    peer: source.sender,
                    message: OutboundMessage::BlockSyncRequest(BlockSyncRequest {
                        sender: self.local_id,
                        first_height,
                        last_height,
                    }),
                };
                self.phase = SyncPhase::WaitingForChunks {
                    source: source.sender,
                    first_height,
                };
                vec![request, self.set_round_timer(self.config.chunk_wait_timeout)]
            }

            SyncPhase::WaitingForChunks { source, .. } => {
                warn!(source = %source, "chunk wait timed out");
                metrics::record_sync_response_error("chunk_timeout");
                self.to_idle()
            }
        }
    }

    /// An availability response arrived. Collected only while a round is
    /// open.
    pub fn on_availability_response(&mut self, response: BlockAvailabilityResponse) {
        if let SyncPhase::CollectingAvailability { responses } = &mut self.phase {
            debug!(source = %response.sender, tip = response.last_committed_height.0,
                "collected availability response");
            responses.push(response);
        }
    }

    /// A chunk response arrived. Returns the block pairs to commit when it
    /// matches the outstanding request; the node then reports back with
    /// [`Self::on_chunk_applied`] or [`Self::on_chunk_failed`].
    pub fn on_sync_response(&mut self, response: BlockSyncResponse) -> Option<Vec<BlockPair>> {
        match &self.phase {
            SyncPhase::WaitingForChunks {
                source,
                first_height,
            } if *source == response.sender && response.first_height == *first_height => {
                Some(response.block_pairs)
            }
            _ => {
                debug!(source = %response.sender, "discarding unsolicited chunk response");
                metrics::record_sync_response_error("unsolicited");
                None
            }
        }
    }

    /// The node applied a chunk (possibly partially). Back to idle; the
    /// next round continues from the new tip.
    pub fn on_chunk_applied(&mut self, applied: usize) -> Vec<Action> {
        metrics::record_sync_blocks_applied(applied);
        self.phase = SyncPhase::Idle;
        // Re-open quickly: if more blocks are missing the next round should
        // not wait out the full idle interval.
        vec![self.set_round_timer(self.config.collect_response_timeout)]
    }

    /// The node aborted a chunk (gap or validation failure).
    pub fn on_chunk_failed(&mut self) -> Vec<Action> {
        metrics::record_sync_response_error("apply_failed");
        self.to_idle()
    }

    /// A block committed. While idle this re-arms the no-commit timer; mid
    /// round the phase timers stand.
    pub fn on_block_committed(&mut self, _height: BlockHeight) -> Vec<Action> {
        match self.phase {
            SyncPhase::Idle => vec![self.set_round_timer(self.config.no_commit_interval)],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> BlockSyncState {
        BlockSyncState::new(ValidatorId(3), SyncConfig::default())
    }

    fn availability(sender: u32, tip: u64) -> BlockAvailabilityResponse {
        BlockAvailabilityResponse {
            sender: ValidatorId(sender),
            first_available: BlockHeight(1),
            last_available: BlockHeight(tip),
            last_committed_height: BlockHeight(tip),
        }
    }

    #[test]
    fn test_idle_timer_opens_round() {
        let mut sync = driver();
        let actions = sync.on_sync_timer(BlockHeight(5));

        assert!(matches!(sync.phase(), SyncPhase::CollectingAvailability { .. }));
        match &actions[0] {
            Action::Broadcast {
                message: OutboundMessage::BlockAvailabilityRequest(req),
            } => {
                assert_eq!(req.first_height, BlockHeight(6));
                assert_eq!(req.last_height, BlockHeight(15));
                assert_eq!(req.last_committed_height, BlockHeight(5));
            }
            other => panic!("unexpected action {}", other.type_name()),
        }
    }

    #[test]
    fn test_source_selection_prefers_furthest_then_first() {
        let mut sync = driver();
        sync.on_sync_timer(BlockHeight(5));

        sync.on_availability_response(availability(1, 20));
        sync.on_availability_response(availability(2, 25));
        sync.on_availability_response(availability(4, 25)); // tie: later responder loses

        let actions = sync.on_sync_timer(BlockHeight(5));
        match &actions[0] {
            Action::Unicast {
                peer,
                message: OutboundMessage::BlockSyncRequest(req),
            } => {
                assert_eq!(*peer, ValidatorId(2));
                assert_eq!(req.first_height, BlockHeight(6));
            }
            other => panic!("unexpected action {}", other.type_name()),
        }
        assert!(matches!(sync.phase(), SyncPhase::WaitingForChunks { .. }));
    }

    #[test]
    fn test_no_responses_returns_to_idle() {
        let mut sync = driver();
        sync.on_sync_timer(BlockHeight(5));
        let actions = sync.on_sync_timer(BlockHeight(5));

        assert!(matches!(sync.phase(), SyncPhase::Idle));
        assert!(matches!(actions[0], Action::SetTimer { id: TimerId::SyncRound, .. }));
    }

    #[test]
    fn test_responses_below_wanted_range_ignored() {
        let mut sync = driver();
        sync.on_sync_timer(BlockHeight(5));
        // Source is itself behind us.
        sync.on_availability_response(availability(1, 4));
        sync.on_sync_timer(BlockHeight(5));
        assert!(matches!(sync.phase(), SyncPhase::Idle));
    }

    #[test]
    fn test_chunk_timeout_returns_to_idle() {
        let mut sync = driver();
        sync.on_sync_timer(BlockHeight(5));
        sync.on_availability_response(availability(1, 20));
        sync.on_sync_timer(BlockHeight(5));
        assert!(matches!(sync.phase(), SyncPhase::WaitingForChunks { .. }));

        sync.on_sync_timer(BlockHeight(5));
        assert!(matches!(sync.phase(), SyncPhase::Idle));
    }

    #[test]
    fn test_unsolicited_chunk_discarded() {
        let mut sync = driver();
        let response = BlockSyncResponse {
            sender: ValidatorId(2),
            first_height: BlockHeight(6),
            last_height: BlockHeight(10),
            block_pairs: vec![],
        };
        assert!(sync.on_sync_response(response).is_none());
    }

    #[test]
    fn test_matching_chunk_accepted_from_chosen_source_only() {
        let mut sync = driver();
        sync.on_sync_timer(BlockHeight(5));
        sync.on_availability_response(availability(2, 25));
        sync.on_sync_timer(BlockHeight(5));

        let from_wrong_peer = BlockSyncResponse {
            sender: ValidatorId(1),
            first_height: BlockHeight(6),
            last_height: BlockHeight(10),
            block_pairs: vec![],
        };
        assert!(sync.on_sync_response(from_wrong_peer).is_none());

        let from_source = BlockSyncResponse {
            sender: ValidatorId(2),
            first_height: BlockHeight(6),
            last_height: BlockHeight(10),
            block_pairs: vec![],
        };
        assert!(sync.on_sync_response(from_source).is_some());
    }
}
