//! Explorer Log Source Adapter
//!
//! Implements the `LogSource` port against an Etherscan-compatible
//! `module=logs&action=getLogs` endpoint.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TroveConfig;
use crate::domain::{RawLog, TroveError};
use crate::ports::{LogQuery, LogSource};

/// Envelope of every explorer response.
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    /// Array of logs, or an error string.
    #[serde(default)]
    result: Value,
}

/// HTTP log source.
pub struct ExplorerLogSource {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ExplorerLogSource {
    /// Build a client from configuration.
    pub fn new(config: &TroveConfig) -> Result<Self, TroveError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TroveError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Query-string parameters for `query`.
    fn params(&self, query: &LogQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("fromBlock", query.from_block.to_string()),
            ("toBlock", query.to_block.to_string()),
            ("address", query.address.to_string()),
            ("topic0", query.topic0.to_string()),
        ];
        if let Some(topic1) = query.topic1 {
            params.push(("topic1", topic1.to_string()));
            params.push(("topic0_1_opr", "and".to_string()));
        }
        if query.offset > 0 {
            params.push(("page", query.page.to_string()));
            params.push(("offset", query.offset.to_string()));
        }
        params.push(("apikey", self.api_key.clone()));
        params
    }
}

/// Turn a decoded envelope into logs.
///
/// String results are either a rate-limit notice or an empty/odd answer;
/// only the former is an error. Malformed entries are dropped one by one.
fn parse_response(response: ExplorerResponse) -> Result<Vec<RawLog>, TroveError> {
    match response.result {
        Value::Array(entries) => {
            let total = entries.len();
            let logs: Vec<RawLog> = entries
                .into_iter()
                .filter_map(|entry| match serde_json::from_value::<RawLog>(entry) {
                    Ok(log) => Some(log),
                    Err(e) => {
                        warn!("[trove] Dropping malformed log entry: {}", e);
                        None
                    }
                })
                .collect();
            if logs.len() < total {
                warn!("[trove] Kept {} of {} log entries", logs.len(), total);
            }
            Ok(logs)
        }
        Value::String(text) => {
            if text.to_ascii_lowercase().contains("rate limit") {
                return Err(TroveError::RateLimited(text));
            }
            if !response.message.starts_with("No records") {
                warn!(
                    "[trove] Explorer returned status {} ({}): {}",
                    response.status, response.message, text
                );
            }
            Ok(Vec::new())
        }
        Value::Null => Ok(Vec::new()),
        other => {
            warn!("[trove] Unexpected explorer result: {}", other);
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl LogSource for ExplorerLogSource {
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<RawLog>, TroveError> {
        debug!(
            "[trove] getLogs address={} from={} to={} page={}",
            query.address, query.from_block, query.to_block, query.page
        );

        let response = self
            .client
            .get(&self.api_url)
            .query(&self.params(query))
            .send()
            .await
            .map_err(|e| TroveError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TroveError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(TroveError::Transport(format!("HTTP {status}")));
        }

        let body = response
            .json::<ExplorerResponse>()
            .await
            .map_err(|e| TroveError::Transport(format!("invalid response body: {e}")))?;
        parse_response(body)
    }
}
