//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every scanner setting has a default, so a file containing only an
//! `[exchanges]` table is a valid configuration.

use anyhow::{Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use crate::types::{ScanError, TradingPair};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Venue name → settings. Keys must match a supported adapter.
    #[serde(default)]
    pub exchanges: BTreeMap<String, ExchangeConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    /// Minimum gross profit, in percent, an opportunity must exceed.
    pub min_profit_pct: f64,
    /// Hypothetical starting capital for triangular returns.
    pub notional: f64,
    pub scan_interval_secs: u64,
    /// Sleep after a failed round before retrying.
    pub retry_backoff_secs: u64,
    /// Per-request timeout for quote and symbol fetches.
    pub quote_timeout_ms: u64,
    pub max_concurrent_fetches: usize,
    /// Symbols compared across exchanges each round.
    pub symbols: Vec<String>,
    /// Currencies used to group pairs for triangular scanning.
    pub base_currencies: Vec<String>,
    /// Upper bound on candidate pairs per base currency. Triple
    /// enumeration is cubic in this number.
    pub max_candidates_per_base: usize,
    /// Only evaluate triples whose legs chain as `X/Q → X/Y → Y/Q`,
    /// pooling the candidates of every base currency.
    pub require_closed_loop: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_profit_pct: 1.0,
            notional: 1000.0,
            scan_interval_secs: 300,
            retry_backoff_secs: 60,
            quote_timeout_ms: 10_000,
            max_concurrent_fetches: 8,
            symbols: vec!["BTC/USDT".into(), "ETH/USDT".into(), "XRP/USDT".into()],
            base_currencies: vec!["BTC".into(), "ETH".into(), "USDT".into()],
            max_candidates_per_base: 40,
            require_closed_loop: false,
        }
    }
}

impl ScannerConfig {
    pub fn min_profit(&self) -> Decimal {
        Decimal::from_f64(self.min_profit_pct).unwrap_or(Decimal::ZERO)
    }

    pub fn notional_amount(&self) -> Decimal {
        Decimal::from_f64(self.notional).unwrap_or(Decimal::ZERO)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_millis(self.quote_timeout_ms)
    }

    /// Reject scanner settings the loop cannot run with, including
    /// thresholds a `Decimal` cannot represent.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.symbols.is_empty() {
            return Err(ScanError::Config("scanner.symbols is empty".into()));
        }
        self.trading_pairs()?;
        if Decimal::from_f64(self.min_profit_pct).is_none() {
            return Err(ScanError::Config(format!(
                "scanner.min_profit_pct is not representable: {}",
                self.min_profit_pct
            )));
        }
        match Decimal::from_f64(self.notional) {
            Some(n) if n > Decimal::ZERO => {}
            _ => {
                return Err(ScanError::Config(format!(
                    "scanner.notional must be a positive representable amount, got {}",
                    self.notional
                )))
            }
        }
        if self.scan_interval_secs == 0 || self.retry_backoff_secs == 0 {
            return Err(ScanError::Config("scan intervals must be non-zero".into()));
        }
        if self.quote_timeout_ms == 0 {
            return Err(ScanError::Config("scanner.quote_timeout_ms must be non-zero".into()));
        }
        if self.max_concurrent_fetches == 0 || self.max_candidates_per_base == 0 {
            return Err(ScanError::Config(
                "fetch concurrency and candidate cap must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse the configured symbols. Fails on the first malformed entry.
    pub fn trading_pairs(&self) -> Result<Vec<TradingPair>, ScanError> {
        self.symbols.iter().map(|s| s.parse()).collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory for `arbitrage_report_*.csv` files.
    pub dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: "reports".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Append log lines to this file in addition to stdout.
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override the venue's public REST endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scan loop cannot run with.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.enabled_exchanges().next().is_none() {
            return Err(ScanError::Config("no exchanges enabled".into()));
        }
        self.scanner.validate()
    }

    /// Enabled venues in name order.
    pub fn enabled_exchanges(&self) -> impl Iterator<Item = (&str, &ExchangeConfig)> {
        self.exchanges
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, cfg)| (name.as_str(), cfg))
    }
}
