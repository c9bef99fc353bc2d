//! Subcommand drivers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use trove_history::{
    Address, CheckpointStore, LogSource, RedemptionScanner, ScanMode, ScanReport, ScanState,
    ScanSupervisor, SessionFileCheckpointStore, TroveConfig, TroveError, TroveHistoryApi,
    TroveHistoryService, DEFAULT_SESSION_KEY,
};

use crate::cli::ScanArgs;
use crate::report;

/// Search one account and print its report.
pub async fn run_account(
    config: TroveConfig,
    source: Arc<dyn LogSource>,
    address: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let account: Address = address
        .parse()
        .with_context(|| format!("invalid address {address}"))?;

    let explorer_tx_url = config.explorer_tx_url.clone();
    let service = TroveHistoryService::new(source, config);
    let history = service
        .account_history(&account, cancel)
        .await
        .context("account search failed")?;

    Ok(report::render_account(&history, &explorer_tx_url))
}

/// Run or control the global redemption scan.
pub async fn run_scan(
    mut config: TroveConfig,
    source: Arc<dyn LogSource>,
    args: &ScanArgs,
    session_dir: &Path,
    cancel: &CancellationToken,
) -> Result<String> {
    if let Some(limit) = args.limit {
        config.scan_limit = limit;
    }
    let store = Arc::new(SessionFileCheckpointStore::new(session_dir, DEFAULT_SESSION_KEY));

    if args.clear {
        store.clear().context("failed to clear checkpoint")?;
        return Ok(format!("Cleared {}", store.path().display()));
    }

    let run_id = Uuid::new_v4();
    let mode = args.mode();
    info!("[trove] Scan run {} ({:?}, limit {})", run_id, mode, config.scan_limit);

    let scanner = RedemptionScanner::new(source, store.clone(), &config);
    let mut supervisor = ScanSupervisor::new(scanner);

    let (tx, mut rx) = unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            println!("{}", report::render_update(&update));
        }
    });

    let scan_token = supervisor.launch(mode, tx).await?;
    let outer = cancel.clone();
    let relay = tokio::spawn(async move {
        outer.cancelled().await;
        scan_token.cancel();
    });

    let outcome = supervisor.wait().await;
    relay.abort();
    if let Err(e) = printer.await {
        warn!("[trove] Progress printer ended abnormally: {}", e);
    }

    let scan = match outcome {
        Ok(Some(report)) => report,
        Ok(None) => bail!("scan task was not running"),
        Err(TroveError::CheckpointMissing) => {
            bail!("no saved scan in {}; start one without --resume", session_dir.display())
        }
        Err(TroveError::InvalidTransition(msg)) => bail!("{msg}"),
        Err(e) => return Err(e).context("scan failed"),
    };
    Ok(summarize(&scan, &config.explorer_tx_url))
}

fn summarize(scan: &ScanReport, explorer_tx_url: &str) -> String {
    let body = report::render_redemptions(&scan.events, explorer_tx_url);
    match scan.state {
        ScanState::Paused => format!(
            "{body}\n\nSearch paused after {} records. Run `scan --resume` to continue.",
            scan.events.len()
        ),
        _ => {
            let mut out = body;
            if scan.decode_errors > 0 {
                out.push_str(&format!("\n\n{} undecodable logs skipped.", scan.decode_errors));
            }
            out
        }
    }
}
