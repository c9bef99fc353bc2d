//! # Outbound Ports
//!
//! Traits for external dependencies: the explorer log API and the session
//! checkpoint slot.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::algorithms::encode_trove_updated;
use crate::domain::{
    Address, Amount, BlockTag, Operation, RawLog, ScanCheckpoint, Topic, TroveError,
};

/// One `getLogs` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    /// Emitting contract.
    pub address: Address,
    /// Event signature.
    pub topic0: Topic,
    /// First indexed argument; `None` queries the whole contract log.
    pub topic1: Option<Topic>,
    /// Inclusive lower bound.
    pub from_block: u64,
    /// Inclusive upper bound.
    pub to_block: BlockTag,
    /// 1-based page number.
    pub page: u32,
    /// Page size; 0 disables paging.
    pub offset: usize,
}

impl LogQuery {
    /// Query the full history of `topic0` on `address`.
    pub fn new(address: Address, topic0: Topic) -> Self {
        Self {
            address,
            topic0,
            topic1: None,
            from_block: 0,
            to_block: BlockTag::Latest,
            page: 1,
            offset: 0,
        }
    }

    /// Restrict to logs whose first indexed argument is `topic1`.
    pub fn with_topic1(mut self, topic1: Topic) -> Self {
        self.topic1 = Some(topic1);
        self
    }

    /// Restrict to an inclusive block range.
    pub fn with_range(mut self, from_block: u64, to_block: BlockTag) -> Self {
        self.from_block = from_block;
        self.to_block = to_block;
        self
    }

    /// Select a page.
    pub fn with_page(mut self, page: u32, offset: usize) -> Self {
        self.page = page;
        self.offset = offset;
        self
    }
}

/// Explorer log API - outbound port.
///
/// Implementations perform exactly one upstream call and return its logs.
/// Pacing, retry and cancellation live in the caller.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Fetch the logs matching `query`.
    ///
    /// # Errors
    /// - `Transport` / `RateLimited` for retryable upstream failures
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TroveError>;
}

/// Session checkpoint slot - outbound port.
///
/// The store only persists what it is given; the scanner owns the content.
pub trait CheckpointStore: Send + Sync {
    /// Read the slot.
    fn load(&self) -> Result<Option<ScanCheckpoint>, TroveError>;

    /// Overwrite the slot.
    fn save(&self, checkpoint: &ScanCheckpoint) -> Result<(), TroveError>;

    /// Empty the slot.
    fn clear(&self) -> Result<(), TroveError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Scripted in-memory log source.
///
/// Answers queries by filtering its logs on contract, topics, block range
/// and page, the way the explorer does.
#[derive(Default)]
pub struct MockLogSource {
    logs: Mutex<Vec<(Address, RawLog)>>,
    queries: Mutex<Vec<LogQuery>>,
    calls: AtomicUsize,
    failures_remaining: AtomicUsize,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl MockLogSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a log emitted by `contract`.
    pub fn push(&self, contract: Address, log: RawLog) {
        self.logs.lock().push((contract, log));
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Fire `token` while serving call number `calls` (1-based).
    pub fn cancel_after(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock() = Some((calls, token));
    }

    /// Number of calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<LogQuery> {
        self.queries.lock().clone()
    }

    /// Build a `TroveUpdated` log.
    pub fn trove_log(
        tx_hash: &str,
        borrower: Address,
        block: u64,
        timestamp: u64,
        debt: Amount,
        collateral: Amount,
        operation: Operation,
    ) -> RawLog {
        RawLog {
            address: None,
            transaction_hash: tx_hash.to_string(),
            block_number: format!("{:#x}", block),
            time_stamp: format!("{:#x}", timestamp),
            log_index: None,
            data: encode_trove_updated(debt, collateral, operation),
            topics: vec![
                crate::config::TROVE_UPDATED_TOPIC.to_string(),
                borrower.to_topic().to_string(),
            ],
        }
    }

    /// Build an ERC-20 `Transfer` log.
    pub fn transfer_log(tx_hash: &str, block: u64, from: Address, to: Address) -> RawLog {
        RawLog {
            address: None,
            transaction_hash: tx_hash.to_string(),
            block_number: format!("{:#x}", block),
            time_stamp: "0x0".to_string(),
            log_index: None,
            data: format!("0x{}", "00".repeat(32)),
            topics: vec![
                crate::config::TRANSFER_TOPIC.to_string(),
                from.to_topic().to_string(),
                to.to_topic().to_string(),
            ],
        }
    }

    fn matches(contract: &Address, log: &RawLog, query: &LogQuery) -> bool {
        if *contract != query.address {
            return false;
        }
        let topic = |i: usize| log.topics.get(i).and_then(|t| t.parse::<Topic>().ok());
        if topic(0) != Some(query.topic0) {
            return false;
        }
        if let Some(topic1) = query.topic1 {
            if topic(1) != Some(topic1) {
                return false;
            }
        }
        let Some(block) = log
            .block_number
            .strip_prefix("0x")
            .and_then(|d| u64::from_str_radix(d, 16).ok())
        else {
            // Malformed blocks are served unfiltered, like a sloppy upstream.
            return true;
        };
        let upper_ok = match query.to_block {
            BlockTag::Number(to) => block <= to,
            BlockTag::Latest => true,
        };
        block >= query.from_block && upper_ok
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TroveError> {
        self.queries.lock().push(query.clone());
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some((at, token)) = self.cancel_after.lock().as_ref() {
            if call >= *at {
                token.cancel();
            }
        }

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TroveError::Transport("mock transport failure".to_string()));
        }

        let matched: Vec<RawLog> = self
            .logs
            .lock()
            .iter()
            .filter(|(contract, log)| Self::matches(contract, log, query))
            .map(|(_, log)| log.clone())
            .collect();

        if query.offset == 0 {
            return Ok(matched);
        }
        let start = (query.page.max(1) as usize - 1) * query.offset;
        Ok(matched.into_iter().skip(start).take(query.offset).collect())
    }
}
