//! # Redeemer Resolution
//!
//! The redeemer is the recipient of the collateral-token `Transfer` emitted
//! by the redemption transaction.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::fetcher::LogFetcher;
use crate::algorithms::decode_transfer_recipient;
use crate::config::{ContractSet, TroveConfig};
use crate::domain::{Address, BlockTag, Cancellable, Pacing, TroveEvent};
use crate::ports::LogQuery;

/// Correlates a redemption with its collateral transfer.
#[derive(Clone)]
pub struct RedeemerResolver {
    fetcher: LogFetcher,
    contracts: ContractSet,
}

impl RedeemerResolver {
    /// Create a resolver issuing its queries through `fetcher`.
    pub fn new(fetcher: LogFetcher, config: &TroveConfig) -> Self {
        Self {
            fetcher,
            contracts: config.contracts.clone(),
        }
    }

    /// Look up the redeemer of `event`.
    ///
    /// Lookup failures are logged and yield `None`; a missing redeemer never
    /// drops the redemption.
    pub async fn resolve(
        &self,
        event: &TroveEvent,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Cancellable<Option<Address>> {
        let query = LogQuery::new(self.contracts.collateral_token, self.contracts.transfer_topic)
            .with_range(event.block_number, BlockTag::Number(event.block_number));

        let logs = match self.fetcher.fetch(&query, pacing, cancel).await {
            Ok(Cancellable::Completed(logs)) => logs,
            Ok(Cancellable::Cancelled) => return Cancellable::Cancelled,
            Err(e) => {
                warn!("[trove] Redeemer lookup for {} failed: {}", event.tx_hash, e);
                return Cancellable::Completed(None);
            }
        };

        let redeemer = logs
            .iter()
            .filter(|log| log.transaction_hash.eq_ignore_ascii_case(&event.tx_hash))
            .filter_map(|log| decode_transfer_recipient(log).ok())
            .find(|to| !to.is_zero());

        if redeemer.is_none() {
            debug!("[trove] No collateral transfer in {}", event.tx_hash);
        }
        Cancellable::Completed(redeemer)
    }
}
