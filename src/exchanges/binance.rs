//! Binance spot market data.
//!
//! API docs: https://developers.binance.com/docs/binance-spot-api-docs/rest-api
//! Base URL: https://api.binance.com
//! Auth: Not required for market data.
//! Symbols are concatenated without a separator (`ETHBTC`).

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{get_json, http_client, parse_price, MarketDataProvider};
use crate::types::{PriceQuote, ScanError, TradingPair};

const BASE_URL: &str = "https://api.binance.com";
const EXCHANGE_NAME: &str = "binance";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// `/api/v3/ticker/bookTicker`: best price on each side of the book.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookTicker {
    #[serde(default)]
    bid_price: String,
    #[serde(default)]
    ask_price: String,
}

/// `/api/v3/exchangeInfo`: we only need the symbol list.
#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    status: String,
    base_asset: String,
    quote_asset: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(EXCHANGE_NAME, timeout)?,
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    fn market_id(pair: &TradingPair) -> String {
        format!("{}{}", pair.base, pair.quote)
    }

    fn to_quote(ticker: &BookTicker) -> PriceQuote {
        PriceQuote {
            bid: parse_price(&ticker.bid_price),
            ask: parse_price(&ticker.ask_price),
        }
    }

    fn to_pairs(info: ExchangeInfo) -> Vec<TradingPair> {
        info.symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(|s| TradingPair::new(&s.base_asset, &s.quote_asset))
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError> {
        let url = format!("{}/api/v3/ticker/bookTicker", self.base_url);
        let symbol = Self::market_id(pair);
        let ticker: BookTicker = get_json(&self.http, &url, &[("symbol", symbol.as_str())])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, format!("{e:#}")))?;
        Ok(Self::to_quote(&ticker))
    }

    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: ExchangeInfo = get_json(&self.http, &url, &[])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", format!("{e:#}")))?;
        let pairs = Self::to_pairs(info);
        debug!(count = pairs.len(), "Binance symbols loaded");
        Ok(pairs)
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}
