//! Coinbase Exchange market data.
//!
//! API docs: https://docs.cdp.coinbase.com/exchange/reference
//! Base URL: https://api.exchange.coinbase.com
//! Auth: Not required for product and ticker endpoints.
//! Product ids use a dash separator (`BTC-USD`). Requests without a
//! `User-Agent` header are rejected.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{get_json, http_client, parse_price, MarketDataProvider};
use crate::types::{PriceQuote, ScanError, TradingPair};

const BASE_URL: &str = "https://api.exchange.coinbase.com";
const EXCHANGE_NAME: &str = "coinbase";

#[derive(Debug, Deserialize)]
struct Ticker {
    #[serde(default)]
    bid: Option<String>,
    #[serde(default)]
    ask: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Product {
    base_currency: String,
    quote_currency: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    trading_disabled: bool,
}

pub struct CoinbaseClient {
    http: Client,
    base_url: String,
}

impl CoinbaseClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(EXCHANGE_NAME, timeout)?,
            base_url: base_url.unwrap_or_else(|| BASE_URL.to_string()),
        })
    }

    fn product_id(pair: &TradingPair) -> String {
        format!("{}-{}", pair.base, pair.quote)
    }

    fn to_quote(ticker: &Ticker) -> PriceQuote {
        PriceQuote {
            bid: ticker.bid.as_deref().and_then(parse_price),
            ask: ticker.ask.as_deref().and_then(parse_price),
        }
    }

    fn to_pairs(products: Vec<Product>) -> Vec<TradingPair> {
        products
            .into_iter()
            .filter(|p| p.status == "online" && !p.trading_disabled)
            .map(|p| TradingPair::new(&p.base_currency, &p.quote_currency))
            .collect()
    }
}

#[async_trait]
impl MarketDataProvider for CoinbaseClient {
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError> {
        let url = format!("{}/products/{}/ticker", self.base_url, Self::product_id(pair));
        let ticker: Ticker = get_json(&self.http, &url, &[])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, pair, format!("{e:#}")))?;
        Ok(Self::to_quote(&ticker))
    }

    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError> {
        let url = format!("{}/products", self.base_url);
        let products: Vec<Product> = get_json(&self.http, &url, &[])
            .await
            .map_err(|e| ScanError::unavailable(EXCHANGE_NAME, "*", format!("{e:#}")))?;
        let pairs = Self::to_pairs(products);
        debug!(count = pairs.len(), "Coinbase products loaded");
        Ok(pairs)
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_ticker() {
        let json = r#"{
            "ask": "64020.11",
            "bid": "64019.98",
            "volume": "10421.2",
            "trade_id": 123456,
            "price": "64020.00",
            "size": "0.01",
            "time": "2026-10-17T09:00:00.000000Z"
        }"#;
        let ticker: Ticker = serde_json::from_str(json).unwrap();
        let quote = CoinbaseClient::to_quote(&ticker);
        assert_eq!(quote.best_bid(), Some(dec!(64019.98)));
        assert_eq!(quote.best_ask(), Some(dec!(64020.11)));
        assert_eq!(CoinbaseClient::product_id(&TradingPair::new("BTC", "USD")), "BTC-USD");
    }

    #[test]
    fn test_parse_products() {
        let json = r#"[
            {"id": "ETH-BTC", "base_currency": "ETH", "quote_currency": "BTC", "status": "online", "trading_disabled": false},
            {"id": "XYZ-USD", "base_currency": "XYZ", "quote_currency": "USD", "status": "delisted", "trading_disabled": true},
            {"id": "ABC-USD", "base_currency": "ABC", "quote_currency": "USD", "status": "online", "trading_disabled": true}
        ]"#;
        let products: Vec<Product> = serde_json::from_str(json).unwrap();
        assert_eq!(CoinbaseClient::to_pairs(products), vec![TradingPair::new("ETH", "BTC")]);
    }
}
