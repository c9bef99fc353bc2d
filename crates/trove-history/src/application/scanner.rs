//! # Bulk Redemption Scanner
//!
//! Walks the global redemption log most-recent first, enriching each
//! redemption and checkpointing after every candidate so an interrupted
//! scan resumes where it stopped.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──start──► Running ──► Completed
//!  ▲                │  ▲
//!  │                │  └──resume── Paused ◄── cancel
//!  └──restart───────┴──► Failed
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::LogFetcher;
use super::reconstruction::PreviousStateFinder;
use super::redeemer::RedeemerResolver;
use crate::algorithms::{decode_trove_updated, sort_newest_first};
use crate::config::{ContractSet, TroveConfig};
use crate::domain::{
    Cancellable, Pacing, RawLog, RedemptionRecord, ScanCheckpoint, TroveError,
};
use crate::ports::{CheckpointStore, LogQuery, LogSource};

/// Lifecycle of one scan session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    /// Nothing started, or restarted.
    Idle,
    /// Processing candidates.
    Running,
    /// Cancelled; the checkpoint is resumable.
    Paused,
    /// Candidates exhausted or limit reached.
    Completed,
    /// Sweep or checkpoint store failed.
    Failed,
}

/// Progress update sent to the caller.
///
/// `events` is always the full list so far; replace, don't append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanUpdate {
    /// Sweep finished.
    TotalFound {
        /// Candidate count.
        total: usize,
        /// Human-readable status.
        message: String,
    },
    /// A candidate was consumed without producing a record.
    Processing {
        /// Candidates consumed.
        current: usize,
        /// Candidate count.
        total: usize,
        /// Human-readable status.
        message: String,
    },
    /// A record was accepted.
    NewEvent {
        /// Accepted records, most recent first, at most `limit`.
        events: Vec<RedemptionRecord>,
        /// Candidates consumed.
        current: usize,
        /// Candidate count.
        total: usize,
        /// Human-readable status.
        message: String,
    },
    /// Scan finished. Sent exactly once per completed run.
    Complete {
        /// Final records.
        events: Vec<RedemptionRecord>,
        /// Human-readable status.
        message: String,
    },
}

/// Summary returned when a run ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// State the scanner ended in.
    pub state: ScanState,
    /// Records accepted so far, most recent first.
    pub events: Vec<RedemptionRecord>,
    /// Candidates consumed during this run.
    pub processed: usize,
    /// Candidates found by the sweep (0 if cancelled before it finished).
    pub total: usize,
    /// Candidates skipped as undecodable during this run.
    pub decode_errors: usize,
}

/// Counters for one run.
#[derive(Default)]
struct RunStats {
    processed: usize,
    total: usize,
    decode_errors: usize,
}

/// Resumable scan over the redemption processor's global log.
pub struct RedemptionScanner {
    fetcher: LogFetcher,
    finder: PreviousStateFinder,
    redeemers: RedeemerResolver,
    store: Arc<dyn CheckpointStore>,
    contracts: ContractSet,
    limit: usize,
    state: ScanState,
}

impl RedemptionScanner {
    /// Create an idle scanner persisting into `store`.
    pub fn new(
        source: Arc<dyn LogSource>,
        store: Arc<dyn CheckpointStore>,
        config: &TroveConfig,
    ) -> Self {
        let fetcher = LogFetcher::new(source, config);
        Self {
            finder: PreviousStateFinder::new(fetcher.clone(), config),
            redeemers: RedeemerResolver::new(fetcher.clone(), config),
            fetcher,
            store,
            contracts: config.contracts.clone(),
            limit: config.scan_limit,
            state: ScanState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Record cap.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Last persisted checkpoint, if any.
    pub fn checkpoint(&self) -> Result<Option<ScanCheckpoint>, TroveError> {
        self.store.load()
    }

    /// Run a scan.
    ///
    /// `None` starts fresh and discards any checkpoint. `Some(k)` loads the
    /// checkpoint and continues with candidate `k + 1`.
    ///
    /// # Errors
    /// - `InvalidTransition` unless idle or paused
    /// - `CheckpointMissing` when resuming without a checkpoint
    /// - `InvalidInput` when `k` is past the candidates the checkpoint saw
    /// - sweep and store failures, after which the state is `Failed`
    pub async fn start(
        &mut self,
        resume_from: Option<usize>,
        cancel: &CancellationToken,
        progress: &UnboundedSender<ScanUpdate>,
    ) -> Result<ScanReport, TroveError> {
        self.check_startable()?;

        let resumed = match resume_from {
            Some(index) => {
                let mut checkpoint = self.store.load()?.ok_or(TroveError::CheckpointMissing)?;
                if index >= checkpoint.progress.total {
                    return Err(TroveError::InvalidInput(format!(
                        "resume index {} out of range for {} candidates",
                        index, checkpoint.progress.total
                    )));
                }
                if checkpoint.last_processed_index() != Some(index) {
                    debug!(
                        "[trove] Resuming at candidate {} (checkpoint had {:?})",
                        index + 1,
                        checkpoint.last_processed_index()
                    );
                    checkpoint.progress.last_processed_index = Some(index);
                    checkpoint.progress.current = index + 1;
                }
                Some(checkpoint)
            }
            None => None,
        };
        self.run(resumed, cancel, progress).await
    }

    /// Continue from the persisted checkpoint.
    ///
    /// A checkpoint that already completed is returned as is, without a new
    /// sweep or any progress updates.
    ///
    /// # Errors
    /// - `CheckpointMissing` when nothing was persisted
    pub async fn resume(
        &mut self,
        cancel: &CancellationToken,
        progress: &UnboundedSender<ScanUpdate>,
    ) -> Result<ScanReport, TroveError> {
        self.check_startable()?;
        let checkpoint = self.store.load()?.ok_or(TroveError::CheckpointMissing)?;
        if checkpoint.completed {
            info!(
                "[trove] Scan already complete with {} records",
                checkpoint.redemptions.len()
            );
            self.state = ScanState::Completed;
            return Ok(ScanReport {
                state: ScanState::Completed,
                events: checkpoint.redemptions.into_iter().take(self.limit).collect(),
                processed: 0,
                total: checkpoint.progress.total,
                decode_errors: 0,
            });
        }
        info!(
            "[trove] Resuming scan after candidate {:?} ({} records)",
            checkpoint.last_processed_index(),
            checkpoint.redemptions.len()
        );
        self.run(Some(checkpoint), cancel, progress).await
    }

    /// Discard the checkpoint and return to `Idle`.
    pub fn restart(&mut self) -> Result<(), TroveError> {
        if self.state == ScanState::Running {
            return Err(TroveError::InvalidTransition(
                "cannot restart a running scan".into(),
            ));
        }
        self.store.clear()?;
        self.state = ScanState::Idle;
        info!("[trove] Scan restarted");
        Ok(())
    }

    /// Discard the checkpoint and results.
    pub fn clear(&mut self) -> Result<(), TroveError> {
        self.restart()
    }

    fn check_startable(&self) -> Result<(), TroveError> {
        match self.state {
            ScanState::Idle | ScanState::Paused => Ok(()),
            other => Err(TroveError::InvalidTransition(format!(
                "cannot start from {other:?}; restart first"
            ))),
        }
    }

    async fn run(
        &mut self,
        resumed: Option<ScanCheckpoint>,
        cancel: &CancellationToken,
        progress: &UnboundedSender<ScanUpdate>,
    ) -> Result<ScanReport, TroveError> {
        self.state = ScanState::Running;
        let result = self.run_inner(resumed, cancel, progress).await;
        match &result {
            Ok(report) => self.state = report.state,
            Err(e) => {
                error!("[trove] Scan failed: {}", e);
                self.state = ScanState::Failed;
            }
        }
        result
    }

    async fn run_inner(
        &self,
        resumed: Option<ScanCheckpoint>,
        cancel: &CancellationToken,
        progress: &UnboundedSender<ScanUpdate>,
    ) -> Result<ScanReport, TroveError> {
        let mut stats = RunStats::default();
        if resumed.is_none() {
            self.store.clear()?;
        }

        let candidates = match self.sweep(cancel).await? {
            Cancellable::Completed(logs) => logs,
            Cancellable::Cancelled => {
                let events = resumed.map(|cp| cp.redemptions).unwrap_or_default();
                return Ok(Self::paused(events, stats));
            }
        };
        stats.total = candidates.len();

        let mut checkpoint = match resumed {
            Some(mut checkpoint) => {
                checkpoint.progress.total = stats.total;
                checkpoint.completed = false;
                checkpoint
            }
            None => ScanCheckpoint::new(stats.total),
        };
        self.store.save(&checkpoint)?;
        Self::emit(
            progress,
            ScanUpdate::TotalFound {
                total: stats.total,
                message: format!("Found {} redemption candidates", stats.total),
            },
        );

        for index in checkpoint.next_index()..candidates.len() {
            if checkpoint.redemptions.len() >= self.limit {
                info!("[trove] Scan limit of {} reached", self.limit);
                break;
            }
            if cancel.is_cancelled() {
                return Ok(Self::paused(checkpoint.redemptions, stats));
            }

            let log = &candidates[index];
            let event = match decode_trove_updated(log) {
                Ok(event) => event,
                Err(e) => {
                    warn!("[trove] Skipping candidate {} ({}): {}", index, log.transaction_hash, e);
                    stats.decode_errors += 1;
                    self.skip(&mut checkpoint, index, &mut stats, progress)?;
                    continue;
                }
            };
            if !event.is_redemption() {
                self.skip(&mut checkpoint, index, &mut stats, progress)?;
                continue;
            }
            if checkpoint.contains(&event.key()) {
                debug!("[trove] Candidate {} already accepted", event.tx_hash);
                self.skip(&mut checkpoint, index, &mut stats, progress)?;
                continue;
            }

            let previous = match event.borrower {
                Some(borrower) => {
                    match self
                        .finder
                        .find_previous_state(&borrower, event.block_number, &[], Pacing::Bulk, cancel)
                        .await
                    {
                        Ok(Cancellable::Completed(state)) => state,
                        Ok(Cancellable::Cancelled) => {
                            return Ok(Self::paused(checkpoint.redemptions, stats))
                        }
                        Err(e) => {
                            warn!("[trove] Reconstruction for {} failed: {}", event.tx_hash, e);
                            None
                        }
                    }
                }
                None => {
                    warn!("[trove] Redemption {} has no borrower topic", event.tx_hash);
                    None
                }
            };

            let redeemer = match self.redeemers.resolve(&event, Pacing::Bulk, cancel).await {
                Cancellable::Completed(redeemer) => redeemer,
                Cancellable::Cancelled => return Ok(Self::paused(checkpoint.redemptions, stats)),
            };

            let record = RedemptionRecord::new(event, previous, redeemer);
            info!(
                "[trove] Accepted redemption {} ({}/{})",
                record.id,
                checkpoint.redemptions.len() + 1,
                self.limit
            );
            checkpoint.redemptions.push(record);
            checkpoint.mark_processed(index);
            self.store.save(&checkpoint)?;
            stats.processed += 1;

            let events: Vec<RedemptionRecord> =
                checkpoint.redemptions.iter().take(self.limit).cloned().collect();
            Self::emit(
                progress,
                ScanUpdate::NewEvent {
                    message: format!("Found {} redemptions", events.len()),
                    events,
                    current: index + 1,
                    total: stats.total,
                },
            );
        }

        checkpoint.completed = true;
        self.store.save(&checkpoint)?;
        let events: Vec<RedemptionRecord> =
            checkpoint.redemptions.iter().take(self.limit).cloned().collect();
        info!(
            "[trove] Scan complete: {} records, {} decode errors",
            events.len(),
            stats.decode_errors
        );
        Self::emit(
            progress,
            ScanUpdate::Complete {
                events: events.clone(),
                message: "Search complete".to_string(),
            },
        );

        Ok(ScanReport {
            state: ScanState::Completed,
            events,
            processed: stats.processed,
            total: stats.total,
            decode_errors: stats.decode_errors,
        })
    }

    /// Global redemption-processor log, most recent first.
    async fn sweep(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<RawLog>>, TroveError> {
        let query = LogQuery::new(
            self.contracts.redemption_processor,
            self.contracts.trove_updated_topic,
        );
        let logs = self.fetcher.fetch(&query, Pacing::Bulk, cancel).await?;
        Ok(logs.map(|mut logs| {
            sort_newest_first(&mut logs);
            logs
        }))
    }

    /// Commit a candidate that produced no record.
    fn skip(
        &self,
        checkpoint: &mut ScanCheckpoint,
        index: usize,
        stats: &mut RunStats,
        progress: &UnboundedSender<ScanUpdate>,
    ) -> Result<(), TroveError> {
        checkpoint.mark_processed(index);
        self.store.save(checkpoint)?;
        stats.processed += 1;
        Self::emit(
            progress,
            ScanUpdate::Processing {
                current: index + 1,
                total: stats.total,
                message: format!("Processing {} of {}", index + 1, stats.total),
            },
        );
        Ok(())
    }

    fn paused(events: Vec<RedemptionRecord>, stats: RunStats) -> ScanReport {
        info!(
            "[trove] Scan paused after {} candidates this run",
            stats.processed
        );
        ScanReport {
            state: ScanState::Paused,
            events,
            processed: stats.processed,
            total: stats.total,
            decode_errors: stats.decode_errors,
        }
    }

    fn emit(progress: &UnboundedSender<ScanUpdate>, update: ScanUpdate) {
        if progress.send(update).is_err() {
            debug!("[trove] Progress receiver dropped");
        }
    }
}
