//! Shared fixtures for the integration flows.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use trove_history::{
    Address, Amount, ContractSet, MockLogSource, Operation, ScanUpdate, TroveConfig,
};

/// Test config with zero delays and a single reconstruction pass.
pub fn config(scan_limit: usize) -> TroveConfig {
    TroveConfig {
        scan_limit,
        reconstruction_attempts: 1,
        ..TroveConfig::for_testing()
    }
}

/// Deterministic borrower address for index `i`.
pub fn borrower(i: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(i + 1).to_be_bytes());
    Address::from_bytes(bytes)
}

/// Source holding `count` redemptions, each preceded by an adjustment of
/// the same trove five blocks earlier.
pub fn seeded_source(contracts: &ContractSet, count: u64) -> Arc<MockLogSource> {
    let source = Arc::new(MockLogSource::new());
    for i in 0..count {
        let block = 1_000 + i * 10;
        source.push(
            contracts.position_manager,
            MockLogSource::trove_log(
                &format!("0xadj{i}"),
                borrower(i),
                block - 5,
                (block - 5) * 12,
                "1000".parse().unwrap(),
                "20".parse().unwrap(),
                Operation::Adjusted,
            ),
        );
        source.push(
            contracts.redemption_processor,
            MockLogSource::trove_log(
                &format!("0xred{i}"),
                borrower(i),
                block,
                block * 12,
                "400".parse().unwrap(),
                "8".parse().unwrap(),
                Operation::Redeemed,
            ),
        );
    }
    source
}

/// Push a lifecycle event for `account`.
#[allow(clippy::too_many_arguments)]
pub fn push_lifecycle(
    source: &MockLogSource,
    contracts: &ContractSet,
    account: Address,
    tx: &str,
    block: u64,
    debt: &str,
    collateral: &str,
    operation: Operation,
) {
    source.push(
        contracts.position_manager,
        MockLogSource::trove_log(
            tx,
            account,
            block,
            block * 12,
            debt.parse().unwrap(),
            collateral.parse().unwrap(),
            operation,
        ),
    );
}

/// Push a redemption of `account` leaving the given remainder.
pub fn push_redemption(
    source: &MockLogSource,
    contracts: &ContractSet,
    account: Address,
    tx: &str,
    block: u64,
    debt: &str,
    collateral: &str,
) {
    source.push(
        contracts.redemption_processor,
        MockLogSource::trove_log(
            tx,
            account,
            block,
            block * 12,
            debt.parse::<Amount>().unwrap(),
            collateral.parse::<Amount>().unwrap(),
            Operation::Redeemed,
        ),
    );
}

/// Everything queued on the progress channel so far.
pub fn drain(rx: &mut UnboundedReceiver<ScanUpdate>) -> Vec<ScanUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}
