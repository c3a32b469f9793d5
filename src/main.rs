//! ARBSCAN: cross-exchange and triangular crypto arbitrage detector
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the exchange clients and runs the scan loop until Ctrl+C.

use anyhow::{Context, Result};
use tracing::info;

use arbscan::config::{self, LoggingConfig};
use arbscan::engine::scan_loop::ScanLoop;
use arbscan::exchanges;
use arbscan::storage::CsvReportSink;

const BANNER: &str = r#"
    _    ____  ____  ____   ____    _    _   _
   / \  |  _ \| __ )/ ___| / ___|  / \  | \ | |
  / _ \ | |_) |  _ \\___ \| |     / _ \ |  \| |
 / ___ \|  _ <| |_) |___) | |___ / ___ \| |\  |
/_/   \_\_| \_\____/|____/ \____/_/   \_\_| \_|

  Cross-exchange & triangular arbitrage scanner
  v0.1.0
"#;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("ARBSCAN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging(&cfg.logging)?;

    println!("{BANNER}");
    info!(
        config = %config_path,
        min_profit_pct = cfg.scanner.min_profit_pct,
        scan_interval_secs = cfg.scanner.scan_interval_secs,
        symbols = ?cfg.scanner.symbols,
        report_dir = %cfg.report.dir,
        "ARBSCAN starting up"
    );

    let exchanges = exchanges::build_exchanges(&cfg)?;
    let sink = CsvReportSink::new(&cfg.report.dir);

    let mut scan_loop = ScanLoop::new(&cfg.scanner, exchanges, Box::new(sink))
        .context("Failed to initialise scan loop")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    info!("Entering main loop. Press Ctrl+C to stop.");
    scan_loop.run(shutdown).await?;

    info!(rounds = scan_loop.rounds(), "ARBSCAN shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber: stdout (JSON when
/// `ARBSCAN_LOG_JSON` is set) plus an optional append-only log file.
fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbscan=info"));

    let json_logging = std::env::var("ARBSCAN_LOG_JSON").is_ok();

    let stdout_layer = if json_logging {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let file_layer = match &cfg.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {path}"))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
