//! # Trove Runtime Library
//!
//! Command-line front end for the `trove-history` crate. The binary in
//! `main.rs` wires configuration, logging and Ctrl-C handling around these
//! modules.

#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod report;

pub use cli::{Cli, Command, ScanArgs};
