//! # Trove History Test Suite
//!
//! Cross-module flows driven through the public API against the scripted
//! log source.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs       # Seeded log sources and configs
//!     ├── account_flows.rs  # Per-account search end to end
//!     └── scan_flows.rs     # Bulk scan: pause, resume, limit, persistence
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p trove-tests
//!
//! # By category
//! cargo test -p trove-tests integration::scan_flows
//! cargo test -p trove-tests integration::account_flows
//! ```

#[cfg(test)]
mod integration;
