//! # Domain Errors
//!
//! Error types for Trove history reconstruction.
//!
//! Cancellation is not an error: a cancelled operation yields [`Cancellable::Cancelled`](crate::domain::Cancellable)
//! with its partial results.

use thiserror::Error;

use super::value_objects::Address;

/// Errors raised while turning a raw log into a typed event.
///
/// These are per-record: a scan counts them and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// A hex field could not be parsed.
    #[error("Invalid hex in field `{field}`: {value}")]
    InvalidHex {
        /// Field name in the raw log
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Payload does not have the expected word layout.
    #[error("Unexpected payload length: expected {expected} bytes, got {got}")]
    PayloadLength {
        /// Expected byte length
        expected: usize,
        /// Actual byte length
        got: usize,
    },

    /// Operation word does not fit in a `u8`.
    #[error("Operation tag out of range")]
    OperationOutOfRange,

    /// A required indexed topic is missing.
    #[error("Missing topic at index {0}")]
    MissingTopic(usize),

    /// An indexed topic does not hold a left-padded address.
    #[error("Topic is not an address: {0}")]
    InvalidTopic(String),
}

/// Trove history error types.
#[derive(Debug, Error)]
pub enum TroveError {
    /// Transport-level failure talking to the explorer (retryable).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Upstream rate limit hit (retryable).
    #[error("Rate limited by upstream: {0}")]
    RateLimited(String),

    /// Every upstream query for a request failed.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A raw log failed to decode.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Reconstruction exhausted every fallback tier.
    #[error("No previous state for {account} before block {before_block}")]
    PreviousStateNotFound {
        /// Account whose history was searched
        account: Address,
        /// Exclusive upper block bound
        before_block: u64,
    },

    /// Resume requested but no checkpoint exists.
    #[error("No scan checkpoint to resume from")]
    CheckpointMissing,

    /// Checkpoint store failure.
    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    /// Malformed caller input (address, amount, topic).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Scanner asked to move between states it cannot connect.
    #[error("Invalid scan transition: {0}")]
    InvalidTransition(String),

    /// A spawned scan task panicked or was aborted.
    #[error("Scan task failed: {0}")]
    TaskFailed(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TroveError {
    /// Whether the failure is transient and worth a backoff-and-retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TroveError::Transport(_) | TroveError::RateLimited(_))
    }
}
