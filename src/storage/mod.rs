//! Report persistence.
//!
//! Writes each interval's ledger to `arbitrage_report_YYYYMMDD_HHMMSS.csv`.
//! Files are written to a temp path and renamed into place, so a report
//! either exists in full or not at all.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::Opportunity;

/// Column order. Union of both opportunity variants' fields.
pub const CSV_HEADER: &str =
    "type,timestamp,symbol,buy_exchange,sell_exchange,buy_price,sell_price,exchange,pairs,profit_percent";

/// Destination for interval reports.
#[cfg_attr(test, mockall::automock)]
pub trait ReportSink: Send {
    /// Persist `opportunities` and return where they went.
    fn write_report(&self, opportunities: &[Opportunity], at: DateTime<Utc>) -> Result<PathBuf>;
}

// ---------------------------------------------------------------------------
// CSV sink
// ---------------------------------------------------------------------------

pub struct CsvReportSink {
    dir: PathBuf,
}

impl CsvReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_name(at: DateTime<Utc>) -> String {
        format!("arbitrage_report_{}.csv", at.format("%Y%m%d_%H%M%S"))
    }

    /// First free path for `at`; a second report within the same second
    /// gets a `_1`, `_2`, … suffix instead of overwriting.
    fn target_path(&self, at: DateTime<Utc>) -> PathBuf {
        let path = self.dir.join(Self::file_name(at));
        if !path.exists() {
            return path;
        }
        let stem = format!("arbitrage_report_{}", at.format("%Y%m%d_%H%M%S"));
        (1..)
            .map(|n| self.dir.join(format!("{stem}_{n}.csv")))
            .find(|p| !p.exists())
            .unwrap_or(path)
    }
}

impl ReportSink for CsvReportSink {
    fn write_report(&self, opportunities: &[Opportunity], at: DateTime<Utc>) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report dir {}", self.dir.display()))?;

        let path = self.target_path(at);
        let csv = render_csv(opportunities);
        write_atomic(&path, csv.as_bytes())?;

        debug!(path = %path.display(), rows = opportunities.len(), "Report written");
        Ok(path)
    }
}

/// Render opportunities as CSV, one row per entry.
pub fn render_csv(opportunities: &[Opportunity]) -> String {
    let mut csv = String::with_capacity(64 * (opportunities.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');

    for opp in opportunities {
        let row: [String; 10] = match opp {
            Opportunity::Simple {
                symbol,
                buy_exchange,
                sell_exchange,
                buy_price,
                sell_price,
                profit_percent,
                timestamp,
            } => [
                opp.kind().to_string(),
                timestamp.to_rfc3339(),
                symbol.to_string(),
                buy_exchange.clone(),
                sell_exchange.clone(),
                buy_price.normalize().to_string(),
                sell_price.normalize().to_string(),
                String::new(),
                String::new(),
                profit_percent.normalize().to_string(),
            ],
            Opportunity::Triangular {
                exchange,
                pairs,
                profit_percent,
                timestamp,
            } => [
                opp.kind().to_string(),
                timestamp.to_rfc3339(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                exchange.clone(),
                pairs
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join("|"),
                profit_percent.normalize().to_string(),
            ],
        };

        let cells: Vec<String> = row.iter().map(|cell| csv_field(cell)).collect();
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }

    csv
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to move report into {}", path.display()))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
