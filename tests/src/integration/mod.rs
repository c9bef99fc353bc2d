//! Integration flows.

mod account_flows;
mod fixtures;
mod scan_flows;
