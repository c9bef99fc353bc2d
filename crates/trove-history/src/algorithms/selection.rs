//! # Previous-State Selection
//!
//! Picks the latest event strictly before a block out of a candidate set
//! that may mix caller-supplied and freshly fetched events.

use crate::domain::{invariant_strictly_before, TroveEvent};

/// Where a candidate came from. Known data outranks fetched data on a tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// Discovered by a fresh upstream query.
    Fetched,
    /// Already present in the caller's event set.
    Known,
}

/// Latest candidate with `block_number < before_block`.
///
/// Ties on block go to the greater timestamp, then to `Origin::Known`, then
/// to the greater log index.
pub fn latest_before<'a, I>(candidates: I, before_block: u64) -> Option<(&'a TroveEvent, Origin)>
where
    I: IntoIterator<Item = (&'a TroveEvent, Origin)>,
{
    candidates
        .into_iter()
        .filter(|(event, _)| invariant_strictly_before(event.block_number, before_block))
        .max_by_key(|(event, origin)| {
            (event.block_number, event.timestamp, *origin, event.log_index)
        })
}
