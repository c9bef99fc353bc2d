//! # Application Module
//!
//! Services orchestrating the domain and outbound ports: paced fetching,
//! previous-state reconstruction, per-account history and the bulk scan.

pub mod fetcher;
pub mod reconstruction;
pub mod redeemer;
pub mod scanner;
pub mod service;
pub mod supervisor;

pub use fetcher::LogFetcher;
pub use reconstruction::PreviousStateFinder;
pub use redeemer::RedeemerResolver;
pub use scanner::{RedemptionScanner, ScanReport, ScanState, ScanUpdate};
pub use service::TroveHistoryService;
pub use supervisor::{ScanMode, ScanSupervisor};
