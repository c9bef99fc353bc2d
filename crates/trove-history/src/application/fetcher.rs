//! # Paced Log Fetcher
//!
//! Wraps a [`LogSource`] with the rate-limit delay, bounded retry, paging and
//! cooperative cancellation every upstream call goes through.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::TroveConfig;
use crate::domain::{Cancellable, Pacing, RawLog, TroveError};
use crate::ports::{LogQuery, LogSource};

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Cancellable<()> {
    if cancel.is_cancelled() {
        return Cancellable::Cancelled;
    }
    if duration.is_zero() {
        return Cancellable::Completed(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Cancellable::Cancelled,
        _ = tokio::time::sleep(duration) => Cancellable::Completed(()),
    }
}

/// Paced, retrying, paginating front for a [`LogSource`].
#[derive(Clone)]
pub struct LogFetcher {
    source: Arc<dyn LogSource>,
    per_account_delay: Duration,
    bulk_delay: Duration,
    max_attempts: u32,
    backoff: Duration,
    page_size: usize,
}

impl LogFetcher {
    /// Create a fetcher over `source` using the pacing in `config`.
    pub fn new(source: Arc<dyn LogSource>, config: &TroveConfig) -> Self {
        Self {
            source,
            per_account_delay: config.per_account_delay,
            bulk_delay: config.bulk_delay,
            max_attempts: config.max_fetch_attempts.max(1),
            backoff: config.fetch_backoff,
            page_size: config.page_size.max(1),
        }
    }

    fn delay(&self, pacing: Pacing) -> Duration {
        match pacing {
            Pacing::PerAccount => self.per_account_delay,
            Pacing::Bulk => self.bulk_delay,
        }
    }

    /// Fetch every page matching `query`.
    ///
    /// Returns `Cancelled` if the token fires during a delay, a call or a
    /// backoff. Retryable errors are retried; anything else propagates.
    pub async fn fetch(
        &self,
        query: &LogQuery,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<RawLog>>, TroveError> {
        let mut logs = Vec::new();
        let mut page = 1u32;

        loop {
            let paged = query.clone().with_page(page, self.page_size);
            let batch = match self.fetch_page(&paged, pacing, cancel).await? {
                Cancellable::Completed(batch) => batch,
                Cancellable::Cancelled => return Ok(Cancellable::Cancelled),
            };

            let short = batch.len() < self.page_size;
            logs.extend(batch);
            if short {
                break;
            }
            page += 1;
        }

        if logs.is_empty() {
            warn!(
                "[trove] No logs for {} topic0={} topic1={:?} range {}..={}",
                query.address,
                query.topic0,
                query.topic1.map(|t| t.to_string()),
                query.from_block,
                query.to_block
            );
        } else {
            debug!("[trove] Fetched {} logs from {}", logs.len(), query.address);
        }
        Ok(Cancellable::Completed(logs))
    }

    async fn fetch_page(
        &self,
        query: &LogQuery,
        pacing: Pacing,
        cancel: &CancellationToken,
    ) -> Result<Cancellable<Vec<RawLog>>, TroveError> {
        let mut attempt = 1u32;
        loop {
            let mut wait = self.delay(pacing);
            if attempt > 1 {
                wait += self.backoff * 2u32.saturating_pow(attempt - 2);
            }
            if sleep_or_cancel(wait, cancel).await.is_cancelled() {
                return Ok(Cancellable::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Cancellable::Cancelled),
                result = self.source.get_logs(query) => result,
            };
            if cancel.is_cancelled() {
                return Ok(Cancellable::Cancelled);
            }

            match result {
                Ok(logs) => return Ok(Cancellable::Completed(logs)),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "[trove] Upstream call failed (attempt {}/{}): {}",
                        attempt, self.max_attempts, e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Amount, Operation, Topic};
    use crate::ports::MockLogSource;

    fn contract() -> Address {
        Address::from_bytes([0x01; 20])
    }

    fn topic0() -> Topic {
        crate::config::TROVE_UPDATED_TOPIC.parse().unwrap()
    }

    fn seeded(n: u64) -> Arc<MockLogSource> {
        let source = Arc::new(MockLogSource::new());
        for i in 0..n {
            source.push(
                contract(),
                MockLogSource::trove_log(
                    &format!("0x{i:02x}"),
                    Address::from_bytes([0xaa; 20]),
                    i + 1,
                    1_000 + i,
                    Amount::zero(),
                    Amount::zero(),
                    Operation::Adjusted,
                ),
            );
        }
        source
    }

    #[tokio::test]
    async fn test_fetch_paginates_until_short_page() {
        let source = seeded(5);
        let config = TroveConfig {
            page_size: 2,
            ..TroveConfig::for_testing()
        };
        let fetcher = LogFetcher::new(source.clone(), &config);

        let logs = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::Bulk, &CancellationToken::new())
            .await
            .unwrap()
            .completed()
            .unwrap();
        assert_eq!(logs.len(), 5);
        assert_eq!(source.call_count(), 3);
        let pages: Vec<u32> = source.queries().iter().map(|q| q.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_retries_transport_errors() {
        let source = seeded(1);
        source.fail_next(2);
        let fetcher = LogFetcher::new(source.clone(), &TroveConfig::for_testing());

        let logs = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::PerAccount, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(logs.completed().map(|l| l.len()), Some(1));
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_budget() {
        let source = seeded(1);
        source.fail_next(10);
        let fetcher = LogFetcher::new(source.clone(), &TroveConfig::for_testing());

        let result = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::PerAccount, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TroveError::Transport(_))));
        assert_eq!(source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_call_makes_no_request() {
        let source = seeded(1);
        let fetcher = LogFetcher::new(source.clone(), &TroveConfig::for_testing());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::Bulk, &cancel)
            .await
            .unwrap();
        assert!(result.is_cancelled());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_call_discards_result() {
        let source = seeded(1);
        let cancel = CancellationToken::new();
        source.cancel_after(1, cancel.clone());
        let fetcher = LogFetcher::new(source.clone(), &TroveConfig::for_testing());

        let result = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::Bulk, &cancel)
            .await
            .unwrap();
        assert!(result.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let source = seeded(1);
        let config = TroveConfig {
            bulk_delay: Duration::from_secs(3600),
            ..TroveConfig::for_testing()
        };
        let fetcher = LogFetcher::new(source.clone(), &config);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::Bulk, &cancel)
            .await
            .unwrap();
        assert!(result.is_cancelled());
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let source = Arc::new(MockLogSource::new());
        let fetcher = LogFetcher::new(source, &TroveConfig::for_testing());
        let logs = fetcher
            .fetch(&LogQuery::new(contract(), topic0()), Pacing::Bulk, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(logs.completed(), Some(vec![]));
    }
}
