//! # Algorithms
//!
//! Pure functions: log decoding and previous-state selection.

pub mod decoder;
pub mod selection;

pub use decoder::{
    decode_transfer_recipient, decode_trove_updated, encode_trove_updated, parse_hex_u64,
    sort_newest_first, topic_at,
};
pub use selection::{latest_before, Origin};
