//! KuCoin spot market data.
//!
//! API docs: https://www.kucoin.com/docs/rest/spot-trading/market-data/introduction
//! Base URL: https://api.kucoin.com
//! Auth: Not required for market data.
//! Responses are wrapped in `{"code": "200000", "data": ...}`; symbols use
//! a dash separator (`BTC-USDT`).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{get_json, http_client, parse_price, MarketDataProvider};
use crate::types::{PriceQuote, ScanError, TradingPair};

const BASE_URL: &str = "https://api.kucoin.com";
const EXCHANGE_NAME: &str = "kucoin";
const SUCCESS_CODE: &str = "200000";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

/// `/api/v1/market/orderbook/level1`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Level1 {
    #[serde(default)]
    best_bid: Option<String>,
    #[serde(default)]
    best_ask: Option<String>,
}

/// `/api/v2/symbols` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    enable_trading: bool,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct KucoinClient {
    http: Client,
    base_url: String,
}

impl KucoinClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(EXCHANGE_NAME, timeout)?,
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    fn market_id(pair: &TradingPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    /// KuCoin returns `data: null` for unknown symbols rather than an error code.
    fn unwrap_envelope<T>(envelope: Envelope<T>) -> std::result::Result<T, String> {
        if envelope.code != SUCCESS_CODE {
            return Err(format!(
                "code {}: {}",
                envelope.code,
                envelope.msg.unwrap_or_default()
            ));
        }
        envelope.data.ok_or_else(|| "no data".to_string())
    }

    fn to_quote(level1: &Level1) -> PriceQuote {
        PriceQuote {
            bid: level1.best_bid.as_deref().and_then(parse_price),
            ask: level1.best_ask.as_deref().and_then(parse_price),
        }
    }

    fn to_pairs(symbols: Vec<SymbolInfo>) -> Vec<TradingPair> {
        symbols
            .into_iter()
            .filter(|s| s.enable_trading)
            .map(|s| TradingPair::new(&s.base_currency, &s.quote_currency))
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for KucoinClient {
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError> {
        let url = format!("{}/api/v1/market/orderbook/level1", self.base_url);
        let symbol = Self::market_id(pair);
        let envelope: Envelope<Level1> = get_json(&self.http, &url, &[("symbol", symbol.as_str())])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, format!("{e:#}")))?;

        let level1 = Self::unwrap_envelope(envelope)
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, e))?;
        Ok(Self::to_quote(&level1))
    }

    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError> {
        let url = format!("{}/api/v2/symbols", self.base_url);
        let envelope: Envelope<Vec<SymbolInfo>> = get_json(&self.http, &url, &[])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", format!("{e:#}")))?;

        let symbols = Self::unwrap_envelope(envelope)
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", e))?;
        let pairs = Self::to_pairs(symbols);
        debug!(count = pairs.len(), "KuCoin symbols loaded");
        Ok(pairs)
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}
