//! # Trove History Configuration
//!
//! Upstream endpoints, contract roles, rate-limit pacing and scan limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{
    Address, Topic, TroveError, DEFAULT_RECONSTRUCTION_ATTEMPTS, DEFAULT_SCAN_LIMIT,
};

/// Position-manager contract emitting every `TroveUpdated` for an account.
pub const DEFAULT_POSITION_MANAGER: &str = "0x80d32B0FE29A56dd4b6eD5BdcfD2D488db4878fb";
/// Redemption-processor contract emitting redemption-only `TroveUpdated` logs.
pub const DEFAULT_REDEMPTION_PROCESSOR: &str = "0x7A47cF15a1fCbAd09c66077d1D021430eed7AC65";
/// Collateral token whose `Transfer` identifies the redeemer.
pub const DEFAULT_COLLATERAL_TOKEN: &str = "0x7a7c9db510aB29A2FC362a4c34260BEcB5cE3446";
/// `TroveUpdated(address,uint256,uint256,uint256,uint8)` topic.
pub const TROVE_UPDATED_TOPIC: &str =
    "0xc3770d654ed33aeea6bf11ac8ef05d02a6a04ed4686dd2f624d853bbec43cc8b";
/// Lowest pause before a per-account call the explorer tolerates.
pub const MIN_PER_ACCOUNT_DELAY: Duration = Duration::from_secs(1);
/// Lowest pause before a bulk sweep call.
pub const MIN_BULK_DELAY: Duration = Duration::from_secs(2);
/// ERC-20 `Transfer(address,address,uint256)` topic.
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// Contract roles consumed from the explorer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractSet {
    /// All open/adjust/redeem events, scoped per account via `topic1`.
    pub position_manager: Address,
    /// Redemption-only events; global when `topic1` is omitted.
    pub redemption_processor: Address,
    /// Collateral token for redeemer lookup.
    pub collateral_token: Address,
    /// `TroveUpdated` topic0.
    pub trove_updated_topic: Topic,
    /// `Transfer` topic0.
    pub transfer_topic: Topic,
}

impl ContractSet {
    fn defaults() -> Result<Self, TroveError> {
        Ok(Self {
            position_manager: DEFAULT_POSITION_MANAGER.parse()?,
            redemption_processor: DEFAULT_REDEMPTION_PROCESSOR.parse()?,
            collateral_token: DEFAULT_COLLATERAL_TOKEN.parse()?,
            trove_updated_topic: TROVE_UPDATED_TOPIC.parse()?,
            transfer_topic: TRANSFER_TOPIC.parse()?,
        })
    }
}

impl Default for ContractSet {
    fn default() -> Self {
        // Constants above are valid hex of the right width.
        Self::defaults().unwrap_or_else(|_| Self {
            position_manager: Address::default(),
            redemption_processor: Address::default(),
            collateral_token: Address::default(),
            trove_updated_topic: Topic::default(),
            transfer_topic: Topic::default(),
        })
    }
}

/// Trove history configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TroveConfig {
    /// Explorer API endpoint (`.../api`).
    pub api_url: String,

    /// Explorer API key.
    pub api_key: String,

    /// Base URL for transaction links in reports.
    pub explorer_tx_url: String,

    /// Contract roles.
    pub contracts: ContractSet,

    /// Delay before each per-account call.
    pub per_account_delay: Duration,

    /// Delay before each bulk-sweep call.
    pub bulk_delay: Duration,

    /// Attempts per upstream call on transport/rate-limit errors.
    pub max_fetch_attempts: u32,

    /// Initial backoff between upstream retries (doubles each time).
    pub fetch_backoff: Duration,

    /// Full passes over the previous-state fallback chain.
    pub reconstruction_attempts: u32,

    /// Initial backoff between reconstruction passes (doubles each time).
    pub reconstruction_backoff: Duration,

    /// Logs per explorer page.
    pub page_size: usize,

    /// Hard cap on records accepted by one bulk scan.
    pub scan_limit: usize,

    /// Concurrent previous-state lookups in per-account flows.
    pub lookup_concurrency: usize,

    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for TroveConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.cronoscan.com/api".to_string(),
            api_key: String::new(),
            explorer_tx_url: "https://cronoscan.com/tx".to_string(),
            contracts: ContractSet::default(),
            per_account_delay: Duration::from_secs(1),
            bulk_delay: Duration::from_secs(2),
            max_fetch_attempts: 3,
            fetch_backoff: Duration::from_secs(1),
            reconstruction_attempts: DEFAULT_RECONSTRUCTION_ATTEMPTS,
            reconstruction_backoff: Duration::from_secs(2),
            page_size: 1000,
            scan_limit: DEFAULT_SCAN_LIMIT,
            lookup_concurrency: 4,
            request_timeout: Duration::from_secs(15),
        }
    }
}

impl TroveConfig {
    /// Create a config for testing (no delays, small pages).
    pub fn for_testing() -> Self {
        Self {
            api_url: "http://localhost:0/api".to_string(),
            per_account_delay: Duration::ZERO,
            bulk_delay: Duration::ZERO,
            fetch_backoff: Duration::ZERO,
            reconstruction_backoff: Duration::ZERO,
            request_timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Defaults overridden from the environment.
    pub fn from_env() -> Result<Self, TroveError> {
        Self::default().apply_env()
    }

    /// Apply `TROVE_*` environment overrides.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `TROVE_API_URL` | `api_url` |
    /// | `TROVE_API_KEY` / `CRONOSCAN_API_KEY` | `api_key` |
    /// | `TROVE_POSITION_MANAGER` | `contracts.position_manager` |
    /// | `TROVE_REDEMPTION_PROCESSOR` | `contracts.redemption_processor` |
    /// | `TROVE_COLLATERAL_TOKEN` | `contracts.collateral_token` |
    /// | `TROVE_SCAN_LIMIT` | `scan_limit` |
    /// | `TROVE_PAGE_SIZE` | `page_size` |
    pub fn apply_env(mut self) -> Result<Self, TroveError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), TroveError> {
        if let Some(url) = lookup("TROVE_API_URL") {
            self.api_url = url;
        }
        if let Some(key) = lookup("TROVE_API_KEY").or_else(|| lookup("CRONOSCAN_API_KEY")) {
            self.api_key = key;
        }
        if let Some(addr) = lookup("TROVE_POSITION_MANAGER") {
            self.contracts.position_manager = addr.parse()?;
        }
        if let Some(addr) = lookup("TROVE_REDEMPTION_PROCESSOR") {
            self.contracts.redemption_processor = addr.parse()?;
        }
        if let Some(addr) = lookup("TROVE_COLLATERAL_TOKEN") {
            self.contracts.collateral_token = addr.parse()?;
        }
        if let Some(limit) = lookup("TROVE_SCAN_LIMIT") {
            self.scan_limit = limit
                .parse()
                .map_err(|_| TroveError::Config(format!("TROVE_SCAN_LIMIT={limit}")))?;
        }
        if let Some(size) = lookup("TROVE_PAGE_SIZE") {
            self.page_size = size
                .parse()
                .map_err(|_| TroveError::Config(format!("TROVE_PAGE_SIZE={size}")))?;
        }
        Ok(())
    }

    /// Reject configurations that would stall, loop or outrun the explorer's
    /// rate limit.
    pub fn validate(&self) -> Result<(), TroveError> {
        if self.per_account_delay < MIN_PER_ACCOUNT_DELAY {
            return Err(TroveError::Config(format!(
                "per_account_delay must be at least {:?}",
                MIN_PER_ACCOUNT_DELAY
            )));
        }
        if self.bulk_delay < MIN_BULK_DELAY {
            return Err(TroveError::Config(format!(
                "bulk_delay must be at least {:?}",
                MIN_BULK_DELAY
            )));
        }
        if self.page_size == 0 {
            return Err(TroveError::Config("page_size must be positive".into()));
        }
        if self.max_fetch_attempts == 0 || self.reconstruction_attempts == 0 {
            return Err(TroveError::Config("attempt budgets must be positive".into()));
        }
        if self.lookup_concurrency == 0 {
            return Err(TroveError::Config("lookup_concurrency must be positive".into()));
        }
        Ok(())
    }
}
