//! Mock exchange for integration testing.
//!
//! Provides a deterministic `MarketDataProvider` implementation that
//! serves fixed quotes and a fixed symbol listing, all in-memory with
//! no network access.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbscan::exchanges::{Exchange, MarketDataProvider};
use arbscan::types::{PriceQuote, ScanError, TradingPair};

/// A mock exchange for deterministic testing.
///
/// Quotes, listing and latency are fully controllable from test code.
pub struct MockExchange {
    name: String,
    quotes: HashMap<TradingPair, PriceQuote>,
    listing: Option<Vec<TradingPair>>,
    delay: Duration,
    listing_delay: Duration,
    panics: bool,
    /// If set, every quote request fails with this reason.
    force_error: Arc<Mutex<Option<String>>>,
    quote_calls: Arc<Mutex<usize>>,
}

impl MockExchange {
    /// An exchange with no quotes and a listing that fails.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            quotes: HashMap::new(),
            listing: None,
            delay: Duration::ZERO,
            listing_delay: Duration::ZERO,
            panics: false,
            force_error: Arc::new(Mutex::new(None)),
            quote_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Serve `bid`/`ask` for `symbol` (e.g. `"BTC/USDT"`).
    pub fn with_quote(mut self, symbol: &str, bid: Decimal, ask: Decimal) -> Self {
        let pair: TradingPair = symbol.parse().expect("valid test symbol");
        self.quotes.insert(pair, PriceQuote::new(bid, ask));
        self
    }

    /// List every symbol that has a quote.
    pub fn listing_quotes(mut self) -> Self {
        self.listing = Some(self.quotes.keys().cloned().collect());
        self
    }

    /// Sleep before answering any request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Extra sleep before answering a symbol listing.
    pub fn with_listing_delay(mut self, delay: Duration) -> Self {
        self.listing_delay = delay;
        self
    }

    /// Panic on every request, like a provider with a bug.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Force all subsequent quote requests to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Number of quote requests served so far (including failures).
    pub fn quote_calls(&self) -> usize {
        *self.quote_calls.lock().unwrap()
    }

    pub fn into_exchange(self) -> Exchange {
        Arc::new(self)
    }
}

#[async_trait]
impl MarketDataProvider for MockExchange {
    async fn fetch_quote(&self, pair: &TradingPair) -> Result<PriceQuote, ScanError> {
        *self.quote_calls.lock().unwrap() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("{} quote handler crashed", self.name);
        }
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(ScanError::unavailable(&self.name, pair, msg));
        }
        self.quotes
            .get(pair)
            .copied()
            .ok_or_else(|| ScanError::unavailable(&self.name, pair, "unknown symbol"))
    }

    async fn list_symbols(&self) -> Result<Vec<TradingPair>, ScanError> {
        let delay = self.delay + self.listing_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("{} listing handler crashed", self.name);
        }
        self.listing
            .clone()
            .ok_or_else(|| ScanError::unavailable(&self.name, "*", "listing unavailable"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
