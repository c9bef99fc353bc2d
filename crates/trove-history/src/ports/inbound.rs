//! # Inbound Ports
//!
//! API trait defining what the Trove history service can answer.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AccountHistory, Address, Cancellable, PreviousState, TroveError, TroveEvent};

/// Trove history API - inbound port.
#[async_trait]
pub trait TroveHistoryApi: Send + Sync {
    /// Every `TroveUpdated` event the position manager emitted for `account`,
    /// chronological.
    async fn find_all_trove_events(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError>;

    /// Redemptions of `account` from the redemption processor, chronological.
    async fn find_redemption_events(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<TroveEvent>>, TroveError>;

    /// State of `account` just before `before_block`.
    ///
    /// # Errors
    /// - `PreviousStateNotFound` when the whole fallback chain comes up empty
    async fn find_previous_state(
        &self,
        account: &Address,
        before_block: u64,
        known: &[TroveEvent],
        cancel: &CancellationToken,
    ) -> Result<Cancellable<PreviousState>, TroveError>;

    /// Lifecycle plus enriched redemptions for `account`.
    ///
    /// Returns whatever was gathered; only total upstream failure is an error.
    async fn account_history(
        &self,
        account: &Address,
        cancel: &CancellationToken,
    ) -> Result<AccountHistory, TroveError>;
}
