//! # Trove History
//!
//! Read-only reconstruction of Trove lifecycles and redemption history from
//! an Etherscan-compatible block-explorer log API.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Decode `TroveUpdated` logs into typed events with exact 18-decimal amounts
//! - Work out what a Trove held right before a redemption, through a layered
//!   fallback search with bounded retry
//! - Scan the global redemption log most-recent first, checkpointing after
//!   every candidate so the scan can be paused and resumed without duplicates
//!
//! ## Previous-State Fallback Chain
//!
//! | Tier | Source | Tag |
//! |------|--------|-----|
//! | 1 | Events the caller already holds | `lifecycle-fallback` / `redemption` |
//! | 2 | Position manager, `toBlock = N - 1` | `on-chain-exact` |
//! | 3 | Position manager + redemption processor | `secondary-contract` |
//! | 4 | Retry tiers 1-3 with backoff | - |
//!
//! ## Module Structure
//!
//! ```text
//! trove-history/
//! ├── domain/          # Events, records, checkpoint, amounts, errors
//! ├── algorithms/      # Log decoding, previous-state selection
//! ├── ports/           # API trait (inbound) + log source / checkpoint store (outbound)
//! ├── application/     # Fetcher, reconstruction, account service, scanner, supervisor
//! ├── adapters/        # Explorer HTTP client, checkpoint stores
//! └── config.rs        # TroveConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    ExplorerLogSource, InMemoryCheckpointStore, SessionFileCheckpointStore, DEFAULT_SESSION_KEY,
};
pub use algorithms::{decode_transfer_recipient, decode_trove_updated, latest_before};
pub use application::{
    LogFetcher, PreviousStateFinder, RedeemerResolver, RedemptionScanner, ScanMode, ScanReport,
    ScanState, ScanSupervisor, ScanUpdate, TroveHistoryService,
};
pub use config::{ContractSet, TroveConfig};
pub use domain::{
    AccountHistory, Address, Amount, BlockTag, Cancellable, DecodeError, EventKey, Operation,
    Pacing, PreviousState, RawLog, RedemptionImpact, RedemptionKind, RedemptionRecord,
    ScanCheckpoint, ScanProgress, StateSource, Topic, TroveError, TroveEvent,
};
pub use ports::{CheckpointStore, LogQuery, LogSource, MockLogSource, TroveHistoryApi};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
