//! # Account Flows
//!
//! Per-account search through `TroveHistoryApi`: lifecycle listing,
//! redemption enrichment and degraded upstream behaviour.

use tokio_util::sync::CancellationToken;
use trove_history::{
    MockLogSource, Operation, RedemptionKind, StateSource, TroveError, TroveHistoryApi,
    TroveHistoryService,
};

use super::fixtures::{borrower, config, push_lifecycle, push_redemption};

fn service() -> (std::sync::Arc<MockLogSource>, TroveHistoryService) {
    let source = std::sync::Arc::new(MockLogSource::new());
    let service = TroveHistoryService::new(source.clone(), config(50));
    (source, service)
}

#[tokio::test]
async fn test_account_history_end_to_end() {
    let (source, service) = service();
    let contracts = service.config().contracts.clone();
    let account = borrower(7);

    push_lifecycle(&source, &contracts, account, "0xopen", 100, "1000", "20", Operation::Opened);
    push_lifecycle(&source, &contracts, account, "0xadj", 150, "1200", "22", Operation::Adjusted);
    push_redemption(&source, &contracts, account, "0xred1", 200, "700", "12");
    push_lifecycle(&source, &contracts, account, "0xadj2", 250, "900", "15", Operation::Adjusted);
    push_redemption(&source, &contracts, account, "0xred2", 300, "0", "0");
    // Another trove on the same contracts.
    push_lifecycle(&source, &contracts, borrower(8), "0xother", 120, "5", "1", Operation::Opened);

    let history = service
        .account_history(&account, &CancellationToken::new())
        .await
        .unwrap();
    assert!(!history.interrupted);
    assert_eq!(history.account, account);

    let lifecycle: Vec<&str> = history.lifecycle.iter().map(|e| e.tx_hash.as_str()).collect();
    assert_eq!(lifecycle, vec!["0xopen", "0xadj", "0xadj2"]);

    assert_eq!(history.redemptions.len(), 2);
    for record in &history.redemptions {
        let previous = record.previous_state.as_ref().unwrap();
        assert!(previous.block_number < record.event.block_number);
    }

    let first = &history.redemptions[0];
    assert_eq!(first.event.tx_hash, "0xred1");
    assert_eq!(first.previous_state.as_ref().unwrap().tx_hash, "0xadj");
    assert_eq!(first.kind(), RedemptionKind::Partial);
    let impact = first.impact().unwrap();
    assert_eq!(impact.debt_reduced.to_string(), "500");
    assert_eq!(impact.collateral_redeemed.to_string(), "10");

    let second = &history.redemptions[1];
    assert_eq!(second.previous_state.as_ref().unwrap().tx_hash, "0xadj2");
    assert_eq!(second.kind(), RedemptionKind::Full);
    assert_eq!(
        second.previous_state.as_ref().unwrap().source,
        StateSource::LifecycleFallback
    );
}

#[tokio::test]
async fn test_back_to_back_redemptions_chain_through_each_other() {
    let (source, service) = service();
    let contracts = service.config().contracts.clone();
    let account = borrower(3);

    push_lifecycle(&source, &contracts, account, "0xopen", 10, "900", "30", Operation::Opened);
    push_redemption(&source, &contracts, account, "0xred1", 20, "600", "20");
    push_redemption(&source, &contracts, account, "0xred2", 30, "100", "3");

    let history = service
        .account_history(&account, &CancellationToken::new())
        .await
        .unwrap();
    let second = &history.redemptions[1];
    let previous = second.previous_state.as_ref().unwrap();
    assert_eq!(previous.tx_hash, "0xred1");
    assert_eq!(previous.source, StateSource::Redemption);
    assert_eq!(second.impact().unwrap().debt_reduced.to_string(), "500");
}

#[tokio::test]
async fn test_lifecycle_outage_still_reports_redemptions() {
    let (source, service) = service();
    let contracts = service.config().contracts.clone();
    let account = borrower(1);

    push_lifecycle(&source, &contracts, account, "0xopen", 10, "900", "30", Operation::Opened);
    push_redemption(&source, &contracts, account, "0xred", 20, "0", "0");
    // Exhausts the retry budget of the lifecycle fetch only.
    source.fail_next(service.config().max_fetch_attempts as usize);

    let history = service
        .account_history(&account, &CancellationToken::new())
        .await
        .unwrap();
    assert!(history.lifecycle.is_empty());
    assert_eq!(history.redemptions.len(), 1);
    let previous = history.redemptions[0].previous_state.as_ref().unwrap();
    assert_eq!(previous.tx_hash, "0xopen");
    assert_eq!(previous.source, StateSource::OnChainExact);
}

#[tokio::test]
async fn test_unreachable_upstream_is_an_error() {
    let (source, service) = service();
    source.fail_next(1_000);

    let result = service
        .account_history(&borrower(1), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(TroveError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn test_empty_account() {
    let (_, service) = service();
    let history = service
        .account_history(&borrower(9), &CancellationToken::new())
        .await
        .unwrap();
    assert!(history.is_empty());
    assert!(!history.interrupted);
}

#[tokio::test]
async fn test_previous_state_lookup_through_api() {
    let (source, service) = service();
    let contracts = service.config().contracts.clone();
    let account = borrower(4);
    push_lifecycle(&source, &contracts, account, "0xa", 10, "10", "1", Operation::Opened);
    push_lifecycle(&source, &contracts, account, "0xb", 40, "20", "2", Operation::Adjusted);
    push_lifecycle(&source, &contracts, account, "0xc", 60, "30", "3", Operation::Adjusted);

    let found = service
        .find_previous_state(&account, 60, &[], &CancellationToken::new())
        .await
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(found.tx_hash, "0xb");
    assert!(found.block_number < 60);

    let missing = service
        .find_previous_state(&account, 10, &[], &CancellationToken::new())
        .await;
    assert!(matches!(missing, Err(TroveError::PreviousStateNotFound { .. })));
}
