//! # Previous-State Reconstruction
//!
//! Fallback chain answering "what did this Trove hold just before block N":
//!
//! 1. Local cross-reference against events the caller already has
//! 2. Exact query of the position manager up to `N - 1`
//! 3. Secondary sweep of the position manager and the redemption processor
//! 4. Bounded retry of the whole chain with backoff (per-account only; the
//!    bulk scanner gives up after one pass)

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::{sleep_or_cancel, LogFetcher};
use crate::algorithms::{decode_trove_updated, latest_before, Origin};
use crate::config::{ContractSet, TroveConfig};
use crate::domain::{
    Address, BlockTag, Cancellable, Pacing, PreviousState, StateSource, TroveError, TroveEvent,
};
use crate::ports::LogQuery;

/// Outcome of one tier.
enum Tier {
    Found(PreviousState),
    Missed,
    Cancelled,
}

/// Finds the state of a Trove immediately before a given block.
#[derive(Clone)]
pub struct PreviousStateFinder {
    fetcher: LogFetcher,
    contracts: ContractSet,
    attempts: u32,
    backoff: Duration,
}

impl PreviousStateFinder {
    /// Create a finder issuing its queries through `fetcher`.
    pub fn new(fetcher: LogFetcher, config: &TroveConfig) -> Self {
        Self {
            fetcher,
            contracts: config.contracts.clone(),
            attempts: config.reconstruction_attempts.max(1),
            backoff: config.reconstruction_backoff,
        }
    }

    /// Run the fallback chain.
    ///
    /// `Pacing::Bulk` makes a single pass over tiers 1-3. `Ok(Completed(None))`
    /// means every tier failed on every attempt; the caller renders it as
    /// missing context.
    pub async fn find_previous_state(
        &self,
        account: &Address,
        before_block: u64,
        known: &[TroveEvent],
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Option<PreviousState>>, TroveError> {
        if before_block == 0 {
            debug!("[trove] Block 0 has no predecessor for {}", account);
            return Ok(Cancellable::Completed(None));
        }

        let attempts = self.attempts_for(pacing);
        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Ok(Cancellable::Cancelled);
            }

            if let Some(state) = self.from_known(account, before_block, known) {
                return Ok(Cancellable::Completed(Some(state)));
            }

            match self.exact_on_chain(account, before_block, pacing, cancel).await {
                Tier::Found(state) => return Ok(Cancellable::Completed(Some(state))),
                Tier::Cancelled => return Ok(Cancellable::Cancelled),
                Tier::Missed => {}
            }

            match self.secondary_sweep(account, before_block, pacing, cancel).await {
                Tier::Found(state) => return Ok(Cancellable::Completed(Some(state))),
                Tier::Cancelled => return Ok(Cancellable::Cancelled),
                Tier::Missed => {}
            }

            if attempt < attempts {
                let wait = self.backoff * 2u32.saturating_pow(attempt - 1);
                debug!(
                    "[trove] No previous state for {} before {} (attempt {}/{}), retrying in {:?}",
                    account, before_block, attempt, attempts, wait
                );
                if sleep_or_cancel(wait, cancel).await.is_cancelled() {
                    return Ok(Cancellable::Cancelled);
                }
            }
        }

        warn!(
            "[trove] Previous state for {} before block {} not found after {} attempts",
            account, before_block, attempts
        );
        Ok(Cancellable::Completed(None))
    }

    /// Standalone lookup: exhaustion is an error rather than `None`.
    ///
    /// # Errors
    /// - `PreviousStateNotFound` when every tier failed on every attempt
    pub async fn find_previous_state_strict(
        &self,
        account: &Address,
        before_block: u64,
        known: &[TroveEvent],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<PreviousState>, TroveError> {
        match self
            .find_previous_state(account, before_block, known, Pacing::PerAccount, cancel)
            .await?
        {
            Cancellable::Completed(Some(state)) => Ok(Cancellable::Completed(state)),
            Cancellable::Completed(None) => Err(TroveError::PreviousStateNotFound {
                account: *account,
                before_block,
            }),
            Cancellable::Cancelled => Ok(Cancellable::Cancelled),
        }
    }

    fn attempts_for(&self, pacing: Pacing) -> u32 {
        match pacing {
            Pacing::PerAccount => self.attempts,
            Pacing::Bulk => 1,
        }
    }

    fn from_known(
        &self,
        account: &Address,
        before_block: u64,
        known: &[TroveEvent],
    ) -> Option<PreviousState> {
        let candidates = known
            .iter()
            .filter(|e| e.borrower.map_or(true, |b| b == *account))
            .map(|e| (e, Origin::Known));
        let (event, _) = latest_before(candidates, before_block)?;

        let source = if event.is_redemption() {
            StateSource::Redemption
        } else {
            StateSource::LifecycleFallback
        };
        debug!(
            "[trove] Previous state for {} from known events at block {}",
            account, event.block_number
        );
        Some(PreviousState::from_event(event, source))
    }

    async fn exact_on_chain(
        &self,
        account: &Address,
        before_block: u64,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Tier {
        let fetched = self
            .fetch_decoded(self.contracts.position_manager, account, before_block, pacing, cancel)
            .await;
        match fetched {
            Ok(Cancellable::Completed(events)) => {
                Self::pick(&events, before_block, StateSource::OnChainExact)
            }
            Ok(Cancellable::Cancelled) => Tier::Cancelled,
            Err(e) => {
                warn!("[trove] Exact on-chain lookup for {} failed: {}", account, e);
                Tier::Missed
            }
        }
    }

    async fn secondary_sweep(
        &self,
        account: &Address,
        before_block: u64,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Tier {
        let primary = self.contracts.position_manager;
        let secondary = self.contracts.redemption_processor;

        let (from_primary, from_secondary) = match pacing {
            Pacing::PerAccount => {
                tokio::join!(
                    self.fetch_decoded(primary, account, before_block, pacing, cancel),
                    self.fetch_decoded(secondary, account, before_block, pacing, cancel),
                )
            }
            Pacing::Bulk => {
                let first = self
                    .fetch_decoded(primary, account, before_block, pacing, cancel)
                    .await;
                if matches!(first, Ok(Cancellable::Cancelled)) {
                    return Tier::Cancelled;
                }
                let second = self
                    .fetch_decoded(secondary, account, before_block, pacing, cancel)
                    .await;
                (first, second)
            }
        };

        let mut merged = Vec::new();
        let mut failures = 0;
        for fetched in [from_primary, from_secondary] {
            match fetched {
                Ok(Cancellable::Completed(events)) => merged.extend(events),
                Ok(Cancellable::Cancelled) => return Tier::Cancelled,
                Err(e) => {
                    warn!("[trove] Secondary sweep query for {} failed: {}", account, e);
                    failures += 1;
                }
            }
        }
        if failures == 2 {
            return Tier::Missed;
        }
        Self::pick(&merged, before_block, StateSource::SecondaryContract)
    }

    fn pick(events: &[TroveEvent], before_block: u64, source: StateSource) -> Tier {
        match latest_before(events.iter().map(|e| (e, Origin::Fetched)), before_block) {
            Some((event, _)) => {
                info!(
                    "[trove] Previous state found at block {} via {}",
                    event.block_number,
                    source.label()
                );
                Tier::Found(PreviousState::from_event(event, source))
            }
            None => Tier::Missed,
        }
    }

    /// `TroveUpdated` logs of `contract` for `account` in `0..before_block`.
    async fn fetch_decoded(
        &self,
        contract: Address,
        account: &Address,
        before_block: u64,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError> {
        let query = LogQuery::new(contract, self.contracts.trove_updated_topic)
            .with_topic1(account.to_topic())
            .with_range(0, BlockTag::Number(before_block.saturating_sub(1)));

        let logs = self.fetcher.fetch(&query, pacing, cancel).await?;
        Ok(logs.map(|logs| {
            logs.iter()
                .filter_map(|log| match decode_trove_updated(log) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(
                            "[trove] Skipping undecodable log {}: {}",
                            log.transaction_hash, e
                        );
                        None
                    }
                })
                .collect()
        }))
    }
}
