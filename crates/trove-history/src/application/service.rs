//! # Trove History Service
//!
//! Per-account flows: lifecycle listing, redemption listing and enrichment
//! of each redemption with its previous state and redeemer.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::fetcher::LogFetcher;
use super::reconstruction::PreviousStateFinder;
use super::redeemer::RedeemerResolver;
use crate::algorithms::decode_trove_updated;
use crate::config::TroveConfig;
use crate::domain::{
    chronological, sort_chronologically, AccountHistory, Address, Cancellable, Pacing,
    PreviousState, RedemptionRecord, TroveError, TroveEvent,
};
use crate::ports::{LogQuery, LogSource, TroveHistoryApi};

/// Trove History Service - orchestrates per-account lookups.
pub struct TroveHistoryService {
    /// Configuration.
    config: TroveConfig,
    /// Paced upstream access.
    fetcher: LogFetcher,
    /// Fallback chain.
    finder: PreviousStateFinder,
    /// Collateral transfer correlation.
    redeemers: RedeemerResolver,
}

impl TroveHistoryService {
    /// Create a service over `source`.
    pub fn new(source: Arc<dyn LogSource>, config: TroveConfig) -> Self {
        let fetcher = LogFetcher::new(source, &config);
        let finder = PreviousStateFinder::new(fetcher.clone(), &config);
        let redeemers = RedeemerResolver::new(fetcher.clone(), &config);
        Self {
            config,
            fetcher,
            finder,
            redeemers,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &TroveConfig {
        &self.config
    }

    /// Internal: decoded `TroveUpdated` events of `contract` for `account`.
    async fn fetch_events(
        &self,
        contract: Address,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError> {
        let query = LogQuery::new(contract, self.config.contracts.trove_updated_topic)
            .with_topic1(account.to_topic());
        let logs = self.fetcher.fetch(&query, Pacing::PerAccount, cancel).await?;

        Ok(logs.map(|logs| {
            let mut events: Vec<TroveEvent> = logs
                .iter()
                .filter_map(|log| match decode_trove_updated(log) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!("[trove] Skipping log {}: {}", log.transaction_hash, e);
                        None
                    }
                })
                .collect();
            sort_chronologically(&mut events);
            events
        }))
    }

    /// Internal: attach previous state and redeemer to one redemption.
    async fn enrich(
        &self,
        event: &TroveEvent,
        account: &Address,
        known: &[TroveEvent],
        cancel: &CancellationToken,
    ) -> Cancellable<RedemptionRecord> {
        let previous: Option<PreviousState> = match self
            .finder
            .find_previous_state(account, event.block_number, known, Pacing::PerAccount, cancel)
            .await
        {
            Ok(Cancellable::Completed(state)) => state,
            Ok(Cancellable::Cancelled) => return Cancellable::Cancelled,
            Err(e) => {
                warn!("[trove] Previous state lookup for {} failed: {}", event.tx_hash, e);
                None
            }
        };

        let redeemer = match self.redeemers.resolve(event, Pacing::PerAccount, cancel).await {
            Cancellable::Completed(redeemer) => redeemer,
            Cancellable::Cancelled => return Cancellable::Cancelled,
        };

        Cancellable::Completed(RedemptionRecord::new(event.clone(), previous, redeemer))
    }
}

#[async_trait]
impl TroveHistoryApi for TroveHistoryService {
    async fn find_all_trove_events(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError> {
        self.fetch_events(self.config.contracts.position_manager, account, cancel)
            .await
    }

    async fn find_redemption_events(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError> {
        let events = self
            .fetch_events(self.config.contracts.redemption_processor, account, cancel)
            .await?;
        Ok(events.map(|events| events.into_iter().filter(|e| e.is_redemption()).collect()))
    }

    async fn find_previous_state(
        &self,
        account: &Address,
        before_block: u64,
        known: &[TroveEvent],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<PreviousState>, TroveError> {
        self.finder
            .find_previous_state_strict(account, before_block, known, cancel)
            .await
    }

    async fn account_history(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<AccountHistory, TroveError> {
        info!("[trove] Searching history for {}", account);
        let mut interrupted = false;

        let lifecycle = self.find_all_trove_events(account, cancel).await;
        let redemptions = if cancel.is_cancelled() {
            Ok(Cancellable::Cancelled)
        } else {
            self.find_redemption_events(account, cancel).await
        };

        let (lifecycle, redemption_events) = match (lifecycle, redemptions) {
            (Err(a), Err(b)) => {
                return Err(TroveError::UpstreamUnavailable(format!(
                    "lifecycle: {a}; redemptions: {b}"
                )))
            }
            (lifecycle, redemptions) => {
                type Fetched = Result<Cancellable<Vec<TroveEvent>>, TroveError>;
                let mut settle = |fetched: Fetched, what: &str| match fetched {
                    Ok(Cancellable::Completed(events)) => events,
                    Ok(Cancellable::Cancelled) => {
                        interrupted = true;
                        Vec::new()
                    }
                    Err(e) => {
                        warn!("[trove] {} fetch for {} failed: {}", what, account, e);
                        Vec::new()
                    }
                };
                let lifecycle = settle(lifecycle, "Lifecycle");
                let redemptions = settle(redemptions, "Redemption");
                (lifecycle, redemptions)
            }
        };

        let mut known: Vec<TroveEvent> = lifecycle
            .iter()
            .chain(redemption_events.iter())
            .cloned()
            .collect();
        sort_chronologically(&mut known);

        let lookups: Vec<_> = redemption_events
            .iter()
            .map(|event| self.enrich(event, account, &known, cancel))
            .collect();
        let enriched: Vec<Cancellable<RedemptionRecord>> = stream::iter(lookups)
            .buffered(self.config.lookup_concurrency.max(1))
            .collect()
            .await;

        let mut redemptions = Vec::with_capacity(enriched.len());
        for record in enriched {
            match record {
                Cancellable::Completed(record) => redemptions.push(record),
                Cancellable::Cancelled => interrupted = true,
            }
        }
        redemptions.sort_by(|a, b| chronological(&a.event, &b.event));

        if lifecycle.is_empty() && redemptions.is_empty() && !interrupted {
            info!("[trove] No Trove activity for {}", account);
        } else {
            info!(
                "[trove] {} lifecycle events, {} redemptions for {}{}",
                lifecycle.len(),
                redemptions.len(),
                account,
                if interrupted { " (interrupted)" } else { "" }
            );
        }

        Ok(AccountHistory {
            account: *account,
            lifecycle,
            redemptions,
            interrupted,
        })
    }
}
