//! Exchange integrations.
//!
//! Defines the `MarketDataProvider` trait and provides public-REST
//! implementations for:
//! - Binance: `/api/v3/ticker/bookTicker`
//! - Kraken: `/0/public/Ticker`
//! - KuCoin: `/api/v1/market/orderbook/level1`
//! - Coinbase Exchange: `/products/{id}/ticker`
//!
//! Only unauthenticated market data endpoints are used; nothing here
//! places orders or reads balances.

pub mod binance;
pub mod coinbase;
pub mod kraken;
pub mod kucoin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::types::{PriceQuote, ScanError, TradingPair};

/// Shared handle to one configured exchange.
pub type Exchange = Arc<dyn MarketDataProvider>;

/// Abstraction over an exchange's market data.
///
/// Implementors return typed failures so the scanners can decide to skip
/// a symbol or an exchange without a catch-all.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Best bid/ask for one trading pair.
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError>;

    /// All currently tradable spot pairs.
    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError>;

    /// Stable exchange name for logging and reports.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Timed fetches
// ---------------------------------------------------------------------------

/// Fetch a quote, treating a timeout or an empty book as unavailable.
pub async fn fetch_quote_within(
    exchange: &dyn MarketDataProvider,
    pair: &TradingPair,
    limit: Duration,
) -> Result<PriceQuote, ScanError> {
    match tokio::time::timeout(limit, exchange.fetch_quote(pair)).await {
        Ok(Ok(quote)) if quote.is_usable() => Ok(quote),
        Ok(Ok(_)) => Err(ScanError::unavailable(exchange.name(), pair, "empty order book")),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ScanError::unavailable(
            exchange.name(),
            pair,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

/// List symbols, treating a timeout or an empty listing as unavailable.
pub async fn list_symbols_within(
    exchange: &dyn MarketDataProvider,
    limit: Duration,
) -> Result<Vec<TradingPair>, ScanError> {
    match tokio::time::timeout(limit, exchange.list_symbols()).await {
        Ok(Ok(symbols)) if !symbols.is_empty() => Ok(symbols),
        Ok(Ok(_)) => Err(ScanError::unavailable(exchange.name(), "*", "no symbols listed")),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ScanError::unavailable(
            exchange.name(),
            "*",
            format!("symbol listing timed out after {}ms", limit.as_millis()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Names accepted under `[exchanges.*]`.
pub const SUPPORTED_EXCHANGES: [&str; 4] = ["binance", "coinbase", "kraken", "kucoin"];

/// Build a client for every enabled exchange in the config.
pub fn build_exchanges(cfg: &AppConfig) -> Result<Vec<Exchange>> {
    let timeout = cfg.scanner.quote_timeout();
    let mut exchanges: Vec<Exchange> = Vec::new();

    for (name, venue) in cfg.enabled_exchanges() {
        let base_url = venue.base_url.clone();
        let exchange: Exchange = match name {
            "binance" => Arc::new(binance::BinanceClient::new(base_url, timeout)?),
            "coinbase" => Arc::new(coinbase::CoinbaseClient::new(base_url, timeout)?),
            "kraken" => Arc::new(kraken::KrakenClient::new(base_url, timeout)?),
            "kucoin" => Arc::new(kucoin::KucoinClient::new(base_url, timeout)?),
            other => {
                return Err(ScanError::Config(format!(
                    "unsupported exchange '{other}' (expected one of {})",
                    SUPPORTED_EXCHANGES.join(", ")
                ))
                .into())
            }
        };
        info!(exchange = name, "Exchange client ready");
        exchanges.push(exchange);
    }

    Ok(exchanges)
}

// ---------------------------------------------------------------------------
// HTTP helpers shared by the adapters
// ---------------------------------------------------------------------------

pub(crate) fn http_client(venue: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent("ARBSCAN/0.1.0 (arbitrage-scanner)")
        .build()
        .with_context(|| format!("Failed to build HTTP client for {venue}"))
}

/// GET a URL and decode the JSON body, failing on non-2xx statuses.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    debug!(url, "GET");

    let resp = http
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("HTTP {status} from {url}: {body}");
    }

    resp.json()
        .await
        .with_context(|| format!("Failed to parse response from {url}"))
}

/// Parse an exchange price string. Empty, malformed and non-positive
/// values yield `None`.
pub(crate) fn parse_price(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|p| *p > Decimal::ZERO)
}
