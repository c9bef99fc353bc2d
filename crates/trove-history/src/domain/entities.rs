//! # Domain Entities
//!
//! Raw explorer logs, decoded Trove events, reconstructed previous states,
//! redemption records and the scan checkpoint.

use serde::{Deserialize, Serialize};

use super::value_objects::{
    Address, Amount, EventKey, Operation, RedemptionImpact, RedemptionKind, StateSource,
};

/// Log record as returned by the explorer's `getLogs` action.
///
/// Numeric fields stay hex-encoded until the decoder validates them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract.
    #[serde(default)]
    pub address: Option<String>,
    /// Transaction hash.
    pub transaction_hash: String,
    /// Block number (hex).
    pub block_number: String,
    /// Block timestamp (hex).
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    /// Log index within the block (hex), when reported.
    #[serde(default)]
    pub log_index: Option<String>,
    /// ABI-encoded non-indexed payload (hex).
    pub data: String,
    /// Indexed topics (hex).
    #[serde(default)]
    pub topics: Vec<String>,
}

/// One state-changing action on a Trove.
///
/// `debt` and `collateral` are absolute values after the event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TroveEvent {
    /// Transaction hash.
    pub tx_hash: String,
    /// Block number.
    pub block_number: u64,
    /// Unix seconds, chain time.
    pub timestamp: u64,
    /// Log index within the block.
    #[serde(default)]
    pub log_index: Option<u64>,
    /// Trove owner, from `topics[1]`.
    #[serde(default)]
    pub borrower: Option<Address>,
    /// Debt after the event.
    pub debt: Amount,
    /// Collateral after the event.
    pub collateral: Amount,
    /// Operation tag.
    pub operation: Operation,
}

impl TroveEvent {
    /// Identity of this event.
    pub fn key(&self) -> EventKey {
        match self.log_index {
            Some(log_index) => EventKey::Log {
                block: self.block_number,
                log_index,
            },
            None => EventKey::Tx {
                tx_hash: self.tx_hash.clone(),
                borrower: self.borrower,
            },
        }
    }

    /// True if this event is a redemption.
    pub fn is_redemption(&self) -> bool {
        self.operation.is_redemption()
    }
}

/// Trove state immediately before a redemption, with its provenance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousState {
    /// Transaction that produced this state.
    pub tx_hash: String,
    /// Block of that transaction.
    pub block_number: u64,
    /// Timestamp of that block.
    pub timestamp: u64,
    /// Debt at that point.
    pub debt: Amount,
    /// Collateral at that point.
    pub collateral: Amount,
    /// Fallback tier that found it.
    pub source: StateSource,
}

impl PreviousState {
    /// Build from the event that set the state.
    pub fn from_event(event: &TroveEvent, source: StateSource) -> Self {
        Self {
            tx_hash: event.tx_hash.clone(),
            block_number: event.block_number,
            timestamp: event.timestamp,
            debt: event.debt,
            collateral: event.collateral,
            source,
        }
    }
}

/// A redemption enriched with reconstructed context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRecord {
    /// Stable record id.
    pub id: String,
    /// The redemption itself (current state).
    pub event: TroveEvent,
    /// State before the redemption; `None` only when every tier failed.
    pub previous_state: Option<PreviousState>,
    /// Recipient of the redeemed collateral.
    pub redeemer: Option<Address>,
}

impl RedemptionRecord {
    /// Assemble a record.
    pub fn new(
        event: TroveEvent,
        previous_state: Option<PreviousState>,
        redeemer: Option<Address>,
    ) -> Self {
        let id = match (event.log_index, event.borrower) {
            (Some(idx), _) => format!("{}-{}", event.tx_hash, idx),
            (None, Some(borrower)) => format!("{}-{}", event.tx_hash, borrower),
            (None, None) => event.tx_hash.clone(),
        };
        Self {
            id,
            event,
            previous_state,
            redeemer,
        }
    }

    /// Identity of the underlying redemption log.
    pub fn key(&self) -> EventKey {
        self.event.key()
    }

    /// FULL when the Trove was left with zero debt and zero collateral.
    pub fn kind(&self) -> RedemptionKind {
        if self.event.debt.is_zero() && self.event.collateral.is_zero() {
            RedemptionKind::Full
        } else {
            RedemptionKind::Partial
        }
    }

    /// Collateral redeemed and debt reduced, if the previous state is known.
    pub fn impact(&self) -> Option<RedemptionImpact> {
        self.previous_state.as_ref().map(|prev| RedemptionImpact {
            collateral_redeemed: prev.collateral.abs_diff(&self.event.collateral),
            debt_reduced: prev.debt.abs_diff(&self.event.debt),
        })
    }
}

/// Everything a per-account search gathered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountHistory {
    /// Account searched.
    pub account: Address,
    /// Position-manager events, chronological.
    pub lifecycle: Vec<TroveEvent>,
    /// Enriched redemptions, chronological.
    pub redemptions: Vec<RedemptionRecord>,
    /// True if cancellation cut the search short.
    pub interrupted: bool,
}

impl AccountHistory {
    /// True when neither lifecycle nor redemptions were found.
    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_empty() && self.redemptions.is_empty()
    }
}

/// Progress counters persisted with a checkpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    /// Candidates processed so far (`last_processed_index + 1`).
    pub current: usize,
    /// Candidates found by the sweep.
    pub total: usize,
    /// Last fully processed candidate; `None` before the first.
    pub last_processed_index: Option<usize>,
}

/// Persisted state of a bulk redemption scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCheckpoint {
    /// Accepted records, most recent first.
    pub redemptions: Vec<RedemptionRecord>,
    /// Progress counters.
    pub progress: ScanProgress,
    /// True once the scan ran out of candidates or hit its limit.
    pub completed: bool,
}

impl ScanCheckpoint {
    /// Fresh checkpoint for a sweep with `total` candidates.
    pub fn new(total: usize) -> Self {
        Self {
            progress: ScanProgress {
                total,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Last fully processed candidate.
    pub fn last_processed_index(&self) -> Option<usize> {
        self.progress.last_processed_index
    }

    /// Index of the next candidate to process.
    pub fn next_index(&self) -> usize {
        self.progress
            .last_processed_index
            .map_or(0, |i| i.saturating_add(1))
    }

    /// Mark candidate `index` as fully processed.
    pub fn mark_processed(&mut self, index: usize) {
        self.progress.last_processed_index = Some(index);
        self.progress.current = index.saturating_add(1);
    }

    /// True if a record with this key was already accepted.
    pub fn contains(&self, key: &EventKey) -> bool {
        self.redemptions.iter().any(|r| &r.key() == key)
    }
}
