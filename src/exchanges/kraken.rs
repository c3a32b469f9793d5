//! Kraken spot market data.
//!
//! API docs: https://docs.kraken.com/api/docs/rest-api/get-ticker-information
//! Base URL: https://api.kraken.com
//! Auth: Not required for public endpoints.
//!
//! Kraken wraps every response in `{"error": [...], "result": {...}}` and
//! uses its own asset codes (`XBT` for bitcoin, `XDG` for dogecoin).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{get_json, http_client, parse_price, MarketDataProvider};
use crate::types::{PriceQuote, ScanError, TradingPair};

const BASE_URL: &str = "https://api.kraken.com";
const EXCHANGE_NAME: &str = "kraken";

/// Kraken asset code ↔ common ticker.
const ASSET_ALIASES: [(&str, &str); 2] = [("XBT", "BTC"), ("XDG", "DOGE")];

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

/// `/0/public/Ticker` entry. `a` and `b` are `[price, whole lot volume, lot volume]`.
#[derive(Debug, Deserialize)]
struct TickerEntry {
    #[serde(default)]
    a: Vec<String>,
    #[serde(default)]
    b: Vec<String>,
}

/// `/0/public/AssetPairs` entry.
#[derive(Debug, Deserialize)]
struct AssetPair {
    /// `XBT/USDT`. Absent for dark-pool pairs.
    #[serde(default)]
    wsname: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KrakenClient {
    http: Client,
    base_url: String,
}

impl KrakenClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(EXCHANGE_NAME, timeout)?,
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    fn to_kraken_asset(asset: &str) -> &str {
        ASSET_ALIASES
            .iter()
            .find(|(_, common)| *common == asset)
            .map_or(asset, |(kraken, _)| *kraken)
    }

    fn from_kraken_asset(asset: &str) -> &str {
        ASSET_ALIASES
            .iter()
            .find(|(kraken, _)| *kraken == asset)
            .map_or(asset, |(_, common)| *common)
    }

    fn market_id(pair: &TradingPair) -> String {
        format!(
            "{}{}",
            Self::to_kraken_asset(&pair.base),
            Self::to_kraken_asset(&pair.quote)
        )
    }

    fn unwrap_envelope<T>(envelope: Envelope<T>) -> std::result::Result<T, String> {
        if !envelope.error.is_empty() {
            return Err(envelope.error.join("; "));
        }
        envelope.result.ok_or_else(|| "missing result".to_string())
    }

    /// Kraken keys the ticker by its canonical pair name, which may differ
    /// from the requested one (`XBTUSD` → `XXBTZUSD`), so take the only entry.
    fn to_quote(result: HashMap<String, TickerEntry>) -> Option<PriceQuote> {
        let entry = result.into_values().next()?;
        Some(PriceQuote {
            bid: entry.b.first().and_then(|p| parse_price(p)),
            ask: entry.a.first().and_then(|p| parse_price(p)),
        })
    }

    fn to_pairs(result: HashMap<String, AssetPair>) -> Vec<TradingPair> {
        result
            .into_values()
            .filter(|p| p.status.as_deref().map_or(true, |s| s == "online"))
            .filter_map(|p| {
                let wsname = p.wsname?;
                let (base, quote) = wsname.split_once('/')?;
                Some(TradingPair::new(
                    Self::from_kraken_asset(base),
                    Self::from_kraken_asset(quote),
                ))
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for KrakenClient {
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError> {
        let url = format!("{}/0/public/Ticker", self.base_url);
        let market = Self::market_id(pair);
        let envelope: Envelope<HashMap<String, TickerEntry>> =
            get_json(&self.http, &url, &[("pair", market.as_str())])
                .await
                .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, format!("{e:#}")))?;

        let result = Self::unwrap_envelope(envelope)
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, e))?;
        Self::to_quote(result)
            .ok_or_else(|| ScanError::unavailable(EXCHANGE_NAME, pair, "empty ticker result"))
    }

    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError> {
        let url = format!("{}/0/public/AssetPairs", self.base_url);
        let envelope: Envelope<HashMap<String, AssetPair>> = get_json(&self.http, &url, &[])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", format!("{e:#}")))?;

        let result = Self::unwrap_envelope(envelope)
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", e))?;
        let pairs = Self::to_pairs(result);
        debug!(count = pairs.len(), "Kraken symbols loaded");
        Ok(pairs)
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}
