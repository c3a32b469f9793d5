//! Scan cycle tests over mock exchanges.

use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use arbscan::config::ScannerConfig;
use arbscan::engine::ledger::Ledger;
use arbscan::engine::scan_loop::ScanLoop;
use arbscan::engine::simple::SimpleScanner;
use arbscan::engine::triangular::{TriangularScanner, TriangularSettings};
use arbscan::exchanges::Exchange;
use arbscan::storage::{CsvReportSink, CSV_HEADER};
use arbscan::types::{Opportunity, TradingPair};

use crate::mock_exchange::MockExchange;

fn temp_dir() -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("arbscan_it_{}", uuid::Uuid::new_v4()));
    p
}

fn config() -> ScannerConfig {
    ScannerConfig {
        symbols: vec!["BTC/USDT".into()],
        quote_timeout_ms: 200,
        ..ScannerConfig::default()
    }
}

fn cheap() -> MockExchange {
    MockExchange::new("cheap").with_quote("BTC/USDT", dec!(99), dec!(100))
}

fn rich() -> MockExchange {
    MockExchange::new("rich").with_quote("BTC/USDT", dec!(102), dec!(103))
}

/// Lists three USDT pairs whose i<j<k triple returns 10%.
fn triangle(name: &str) -> MockExchange {
    MockExchange::new(name)
        .with_quote("AAA/USDT", dec!(0.99), dec!(1))
        .with_quote("BBB/USDT", dec!(1), dec!(1.01))
        .with_quote("CCC/USDT", dec!(1.1), dec!(1.11))
        .listing_quotes()
}

fn report_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Scanners
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_timed_out_exchange_is_excluded() {
    let slow = MockExchange::new("slow")
        .with_quote("BTC/USDT", dec!(110), dec!(111))
        .with_delay(Duration::from_millis(500));
    let exchanges: Vec<Exchange> = vec![
        cheap().into_exchange(),
        slow.into_exchange(),
        rich().into_exchange(),
    ];

    let scanner = SimpleScanner::new(dec!(1), Duration::from_millis(50));
    let mut ledger = Ledger::new();
    let found = scanner
        .scan(&TradingPair::new("BTC", "USDT"), &exchanges, &mut ledger)
        .await;

    assert_eq!(found, 1);
    match &ledger.entries()[0] {
        Opportunity::Simple { buy_exchange, sell_exchange, profit_percent, .. } => {
            assert_eq!(buy_exchange, "cheap");
            assert_eq!(sell_exchange, "rich");
            assert_eq!(*profit_percent, dec!(2));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_listing_skips_only_that_exchange() {
    let exchanges: Vec<Exchange> = vec![
        MockExchange::new("down").into_exchange(),
        triangle("tri_a").into_exchange(),
        triangle("tri_b").into_exchange(),
    ];

    let scanner = TriangularScanner::new(TriangularSettings::from(&config()));
    let mut ledger = Ledger::new();
    let round = scanner.scan(&exchanges, &mut ledger).await;

    assert_eq!(round.exchanges_failed, 1);
    assert_eq!(round.exchanges_scanned, 2);
    assert_eq!(round.found, 2);

    let venues: Vec<&str> = ledger
        .entries()
        .iter()
        .map(|o| match o {
            Opportunity::Triangular { exchange, profit_percent, .. } => {
                assert_eq!(*profit_percent, dec!(10));
                exchange.as_str()
            }
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(venues, vec!["tri_a", "tri_b"]);
}

// ---------------------------------------------------------------------------
// Scan loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_round_to_csv_report() {
    let dir = temp_dir();
    let exchanges: Vec<Exchange> = vec![
        cheap().into_exchange(),
        rich().into_exchange(),
        triangle("tri").into_exchange(),
    ];

    let mut scan_loop =
        assert_ok!(ScanLoop::new(&config(), exchanges, Box::new(CsvReportSink::new(&dir))));

    let summary = scan_loop.scan_round().await;
    assert_eq!(summary.simple_found, 1);
    assert_eq!(summary.triangular_found, 1);
    assert_eq!(summary.exchanges_failed, 2);

    let path = assert_ok!(scan_loop.report()).expect("non-empty ledger writes a report");
    assert!(scan_loop.ledger().is_empty());

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("arbitrage_report_") && name.ends_with(".csv"));

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("simple,"));
    assert!(lines[1].contains("BTC/USDT,cheap,rich,100,102"));
    assert!(lines[2].starts_with("triangular,"));
    assert!(lines[2].contains("tri,AAA/USDT|BBB/USDT|CCC/USDT,10"));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_next_report_holds_only_new_findings() {
    let dir = temp_dir();
    let rich = Arc::new(rich());
    let exchanges: Vec<Exchange> = vec![cheap().into_exchange(), rich.clone() as Exchange];

    let mut scan_loop =
        assert_ok!(ScanLoop::new(&config(), exchanges, Box::new(CsvReportSink::new(&dir))));

    scan_loop.scan_round().await;
    assert_eq!(scan_loop.ledger().len(), 1);
    assert!(assert_ok!(scan_loop.report()).is_some());

    // The rich venue goes dark: nothing left to compare against.
    rich.set_error("maintenance");
    let summary = scan_loop.scan_round().await;
    assert_eq!(summary.simple_found, 0);
    assert_eq!(rich.quote_calls(), 2);

    assert_eq!(assert_ok!(scan_loop.report()), None);
    assert_eq!(report_files(&dir).len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_quiet_market_writes_no_reports() {
    let dir = temp_dir();
    let exchanges: Vec<Exchange> = vec![
        MockExchange::new("a").with_quote("BTC/USDT", dec!(100), dec!(101)).into_exchange(),
        MockExchange::new("b").with_quote("BTC/USDT", dec!(100.5), dec!(101.5)).into_exchange(),
    ];

    let mut scan_loop =
        assert_ok!(ScanLoop::new(&config(), exchanges, Box::new(CsvReportSink::new(&dir))))
            .with_intervals(Duration::from_millis(5), Duration::from_millis(5));

    assert_ok!(scan_loop.run(tokio::time::sleep(Duration::from_millis(100))).await);

    assert!(scan_loop.rounds() >= 2, "ran {} rounds", scan_loop.rounds());
    assert!(report_files(&dir).is_empty());
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_unwritable_report_dir_keeps_loop_alive() {
    let dir = temp_dir();
    // A regular file where the report directory should be.
    std::fs::write(&dir, b"not a dir").unwrap();

    let exchanges: Vec<Exchange> = vec![cheap().into_exchange(), rich().into_exchange()];
    let mut scan_loop =
        assert_ok!(ScanLoop::new(&config(), exchanges, Box::new(CsvReportSink::new(&dir))))
            .with_intervals(Duration::from_secs(3600), Duration::from_millis(5));

    scan_loop.scan_round().await;
    assert_err!(scan_loop.report());
    assert_eq!(scan_loop.ledger().len(), 1);

    assert_ok!(scan_loop.run(tokio::time::sleep(Duration::from_millis(100))).await);

    // Each failed round retries on the short back-off and keeps its findings.
    assert!(scan_loop.rounds() >= 2, "ran {} rounds", scan_loop.rounds());
    assert_eq!(scan_loop.ledger().len() as u64, scan_loop.rounds());

    std::fs::remove_file(&dir).unwrap();
}

#[tokio::test]
async fn test_scanner_panic_retries_on_backoff() {
    let dir = temp_dir();
    let exchanges: Vec<Exchange> = vec![
        MockExchange::new("boom")
            .with_quote("BTC/USDT", dec!(99), dec!(100))
            .listing_quotes()
            .panicking()
            .into_exchange(),
        rich().into_exchange(),
    ];

    let mut scan_loop =
        assert_ok!(ScanLoop::new(&config(), exchanges, Box::new(CsvReportSink::new(&dir))))
            .with_intervals(Duration::from_secs(3600), Duration::from_millis(5));

    assert_ok!(scan_loop.run(tokio::time::sleep(Duration::from_millis(150))).await);

    // Only the short back-off lets more than one round fit before shutdown.
    assert!(scan_loop.rounds() >= 3, "ran {} rounds", scan_loop.rounds());
    assert!(scan_loop.ledger().is_empty());
    assert!(report_files(&dir).is_empty());
}

#[tokio::test]
async fn test_shutdown_mid_round_flushes_ledger() {
    let dir = temp_dir();
    // Answers quotes at once but takes seconds to list symbols, so shutdown
    // lands in the triangular phase after the simple findings are in.
    let stalled = MockExchange::new("stalled").with_listing_delay(Duration::from_secs(5));
    let exchanges: Vec<Exchange> = vec![
        cheap().into_exchange(),
        rich().into_exchange(),
        stalled.into_exchange(),
    ];
    let cfg = ScannerConfig {
        quote_timeout_ms: 10_000,
        ..config()
    };

    let mut scan_loop =
        assert_ok!(ScanLoop::new(&cfg, exchanges, Box::new(CsvReportSink::new(&dir))));

    assert_ok!(scan_loop.run(tokio::time::sleep(Duration::from_millis(150))).await);

    assert_eq!(scan_loop.rounds(), 1);
    assert!(scan_loop.ledger().is_empty());

    let files = report_files(&dir);
    assert_eq!(files.len(), 1);
    let contents = std::fs::read_to_string(&files[0]).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], CSV_HEADER);
    assert!(lines[1].starts_with("simple,"));
    assert!(lines[1].contains("BTC/USDT,cheap,rich,100,102"));

    std::fs::remove_dir_all(&dir).unwrap();
}
