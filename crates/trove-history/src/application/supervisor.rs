//! # Scan Supervisor
//!
//! Owns the single active scan task. Launching a scan first cancels and
//! awaits whatever was running, so two scans never write the checkpoint at
//! the same time.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::scanner::{RedemptionScanner, ScanReport, ScanState, ScanUpdate};
use crate::domain::TroveError;

/// How a launched scan begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Discard any checkpoint and start at the newest candidate.
    Fresh,
    /// Continue from the persisted checkpoint.
    Resume,
    /// Reset to idle, then start fresh.
    Restart,
}

struct ActiveScan {
    cancel: CancellationToken,
    handle: JoinHandle<Result<ScanReport, TroveError>>,
}

/// Single-active-scan owner.
pub struct ScanSupervisor {
    scanner: Arc<Mutex<RedemptionScanner>>,
    active: Option<ActiveScan>,
}

impl ScanSupervisor {
    /// Wrap a scanner.
    pub fn new(scanner: RedemptionScanner) -> Self {
        Self {
            scanner: Arc::new(Mutex::new(scanner)),
            active: None,
        }
    }

    /// Scanner state, or `Running` while a task holds the scanner.
    pub fn state(&self) -> ScanState {
        match self.scanner.try_lock() {
            Ok(scanner) => scanner.state(),
            Err(_) => ScanState::Running,
        }
    }

    /// True while a launched task has not been awaited.
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Stop any running scan, then spawn a new one.
    ///
    /// Returns the token that pauses the new scan.
    pub async fn launch(
        &mut self,
        mode: ScanMode,
        progress: UnboundedSender<ScanUpdate>,
    ) -> Result<CancellationToken, TroveError> {
        match self.stop().await {
            Ok(Some(report)) => info!("[trove] Previous scan stopped in {:?}", report.state),
            Ok(None) => {}
            Err(e) => warn!("[trove] Previous scan ended with error: {}", e),
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scanner = Arc::clone(&self.scanner);

        let handle = tokio::spawn(async move {
            let mut scanner = scanner.lock().await;
            match mode {
                ScanMode::Fresh => scanner.start(None, &token, &progress).await,
                ScanMode::Resume => scanner.resume(&token, &progress).await,
                ScanMode::Restart => {
                    scanner.restart()?;
                    scanner.start(None, &token, &progress).await
                }
            }
        });

        self.active = Some(ActiveScan {
            cancel: cancel.clone(),
            handle,
        });
        Ok(cancel)
    }

    /// Cancel the active scan and wait for it to settle.
    ///
    /// Returns its report, or `None` if nothing was running.
    pub async fn stop(&mut self) -> Result<Option<ScanReport>, TroveError> {
        match self.active.take() {
            Some(active) => {
                active.cancel.cancel();
                Self::join(active).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Wait for the active scan without cancelling it.
    pub async fn wait(&mut self) -> Result<Option<ScanReport>, TroveError> {
        match self.active.take() {
            Some(active) => Self::join(active).await.map(Some),
            None => Ok(None),
        }
    }

    /// Reset the scanner to idle and clear its checkpoint.
    pub async fn clear(&mut self) -> Result<(), TroveError> {
        self.stop().await?;
        self.scanner.lock().await.clear()
    }

    async fn join(active: ActiveScan) -> Result<ScanReport, TroveError> {
        match active.handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!("[trove] Scan task ended abnormally: {}", e);
                Err(TroveError::TaskFailed(e.to_string()))
            }
        }
    }
}
