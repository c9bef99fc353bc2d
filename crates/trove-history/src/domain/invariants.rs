//! # Domain Invariants
//!
//! Constants and ordering rules every component relies on.

use std::cmp::Ordering;

use super::entities::TroveEvent;

/// ABI words in a `TroveUpdated` payload: debt, collateral, stake, operation.
pub const TROVE_UPDATED_WORDS: usize = 4;

/// Default fallback passes for previous-state reconstruction.
pub const DEFAULT_RECONSTRUCTION_ATTEMPTS: u32 = 3;

/// Default cap on records accepted by one bulk scan.
pub const DEFAULT_SCAN_LIMIT: usize = 50;

/// Chronological order of Trove events: block, then timestamp, then log index.
///
/// Events without a log index sort before indexed ones in the same block.
pub fn chronological(a: &TroveEvent, b: &TroveEvent) -> Ordering {
    a.block_number
        .cmp(&b.block_number)
        .then(a.timestamp.cmp(&b.timestamp))
        .then(a.log_index.cmp(&b.log_index))
}

/// Sort a Trove history in place.
pub fn sort_chronologically(events: &mut [TroveEvent]) {
    events.sort_by(chronological);
}

/// Invariant: a sorted history never goes back in block or time.
pub fn invariant_chronological(events: &[TroveEvent]) -> bool {
    events
        .windows(2)
        .all(|w| chronological(&w[0], &w[1]) != Ordering::Greater)
}

/// Invariant: a previous state must come from strictly before the redemption block.
pub fn invariant_strictly_before(candidate_block: u64, before_block: u64) -> bool {
    candidate_block < before_block
}
