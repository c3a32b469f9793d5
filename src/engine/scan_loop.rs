//! The scan → report → sleep loop.
//!
//! Two states, cycling until shutdown:
//! - **Scanning**: simple scan over every configured symbol, then a
//!   triangular scan over every exchange.
//! - **Reporting**: hand a non-empty ledger to the report sink and clear it.
//!
//! A failed pass (report I/O error, or a panic inside a scanner) is logged
//! and followed by the shorter retry back-off; the loop itself only returns
//! on shutdown.

use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::ledger::Ledger;
use super::simple::SimpleScanner;
use super::triangular::{TriangularScanner, TriangularSettings};
use crate::config::ScannerConfig;
use crate::exchanges::Exchange;
use crate::storage::ReportSink;
use crate::types::{ScanError, TradingPair};

/// Entries kept while reports keep failing; older ones are dropped first.
pub const DEFAULT_PENDING_CAP: usize = 10_000;

// ---------------------------------------------------------------------------
// Round bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    Reporting,
}

/// Summary of a single scanning pass.
#[derive(Debug, Clone, Default)]
pub struct RoundSummary {
    pub round: u64,
    pub symbols_scanned: usize,
    pub simple_found: usize,
    pub triangular_found: usize,
    pub exchanges_failed: usize,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Scan loop
// ---------------------------------------------------------------------------

pub struct ScanLoop {
    exchanges: Vec<Exchange>,
    symbols: Vec<TradingPair>,
    simple: SimpleScanner,
    triangular: TriangularScanner,
    sink: Box<dyn ReportSink>,
    ledger: Ledger,
    state: LoopState,
    rounds: u64,
    scan_interval: Duration,
    retry_backoff: Duration,
    pending_cap: usize,
}

impl ScanLoop {
    pub fn new(
        cfg: &ScannerConfig,
        exchanges: Vec<Exchange>,
        sink: Box<dyn ReportSink>,
    ) -> Result<Self, ScanError> {
        cfg.validate()?;
        if exchanges.is_empty() {
            return Err(ScanError::Config("scan loop needs at least one exchange".into()));
        }

        Ok(Self {
            symbols: cfg.trading_pairs()?,
            simple: SimpleScanner::new(cfg.min_profit(), cfg.quote_timeout()),
            triangular: TriangularScanner::new(TriangularSettings::from(cfg)),
            exchanges,
            sink,
            ledger: Ledger::new(),
            state: LoopState::Scanning,
            rounds: 0,
            scan_interval: cfg.scan_interval(),
            retry_backoff: cfg.retry_backoff(),
            pending_cap: DEFAULT_PENDING_CAP,
        })
    }

    /// Override the sleep durations (tests use milliseconds).
    pub fn with_intervals(mut self, scan_interval: Duration, retry_backoff: Duration) -> Self {
        self.scan_interval = scan_interval;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Override how many unreported entries survive failed reports.
    pub fn with_pending_cap(mut self, cap: usize) -> Self {
        self.pending_cap = cap.max(1);
        self
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Scanning state: run both scanners once, appending to the ledger.
    pub async fn scan_round(&mut self) -> RoundSummary {
        self.state = LoopState::Scanning;
        self.rounds += 1;
        let started = Instant::now();
        info!(round = self.rounds, "Starting scan round");

        let mut summary = RoundSummary {
            round: self.rounds,
            ..RoundSummary::default()
        };

        for symbol in &self.symbols {
            summary.simple_found += self
                .simple
                .scan(symbol, &self.exchanges, &mut self.ledger)
                .await;
            summary.symbols_scanned += 1;
        }

        let tri = self.triangular.scan(&self.exchanges, &mut self.ledger).await;
        summary.triangular_found = tri.found;
        summary.exchanges_failed = tri.exchanges_failed;
        summary.elapsed = started.elapsed();
        summary
    }

    /// Scanning state, with a panic inside a scanner surfaced as `RoundFailure`.
    async fn guarded_scan_round(&mut self) -> Result<RoundSummary, ScanError> {
        AssertUnwindSafe(self.scan_round())
            .catch_unwind()
            .await
            .map_err(|panic| {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                ScanError::RoundFailure(format!("scanner panicked: {reason}"))
            })
    }

    /// Reporting state: persist and clear a non-empty ledger.
    ///
    /// An empty ledger produces no artifact. On a sink failure the ledger
    /// is kept so the next report includes these entries, trimmed to the
    /// newest `pending_cap`.
    pub fn report(&mut self) -> Result<Option<PathBuf>, ScanError> {
        self.state = LoopState::Reporting;

        if self.ledger.is_empty() {
            info!("No arbitrage opportunities found");
            return Ok(None);
        }

        let (simple, triangular) = self.ledger.counts();
        let path = match self.sink.write_report(self.ledger.entries(), Utc::now()) {
            Ok(path) => path,
            Err(e) => {
                let dropped = self.ledger.retain_latest(self.pending_cap);
                if dropped > 0 {
                    warn!(
                        dropped,
                        pending = self.ledger.len(),
                        cap = self.pending_cap,
                        "Unreported opportunities over cap; oldest dropped"
                    );
                }
                return Err(ScanError::RoundFailure(format!("report write failed: {e:#}")));
            }
        };

        info!(
            path = %path.display(),
            opportunities = self.ledger.len(),
            simple,
            triangular,
            "Report generated"
        );
        self.ledger.clear();
        Ok(Some(path))
    }

    /// Run until `shutdown` resolves.
    ///
    /// Shutdown abandons an in-progress scan or sleep, then flushes whatever
    /// the ledger already holds in one final report.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            exchanges = self.exchanges.len(),
            symbols = self.symbols.len(),
            interval_secs = self.scan_interval.as_secs(),
            "Entering scan loop"
        );

        loop {
            let scanned = tokio::select! {
                result = self.guarded_scan_round() => result,
                _ = &mut shutdown => {
                    info!("Shutdown signal received during scan");
                    break;
                }
            };

            let outcome = scanned.and_then(|summary| {
                log_round_summary(&summary);
                self.report()
            });

            let pause = match outcome {
                Ok(_) => self.scan_interval,
                Err(e) => {
                    error!(error = %e, backoff_secs = self.retry_backoff.as_secs(), "Round failed, backing off");
                    self.retry_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if !self.ledger.is_empty() {
            if let Err(e) = self.report() {
                warn!(error = %e, pending = self.ledger.len(), "Final report failed; pending opportunities discarded");
            }
        }

        info!(rounds = self.rounds, "Scan loop stopped");
        Ok(())
    }
}

/// Log a human-readable round summary.
fn log_round_summary(summary: &RoundSummary) {
    info!(
        round = summary.round,
        symbols = summary.symbols_scanned,
        simple = summary.simple_found,
        triangular = summary.triangular_found,
        exchanges_failed = summary.exchanges_failed,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Round complete"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
