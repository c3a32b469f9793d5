//! Shared types for the ARBSCAN detector.
//!
//! These types form the data model used across all modules.
//! Exchange adapters, scanners, the ledger and the report sink all
//! depend on this module and nothing else in the crate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Trading pair
// ---------------------------------------------------------------------------

/// A spot market symbol such as `ETH/BTC`.
///
/// Always stored upper-cased. `base` is the asset being priced, `quote`
/// the asset the price is expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }

    /// Whether either leg of the pair is the given currency token.
    pub fn has_currency(&self, currency: &str) -> bool {
        self.base.eq_ignore_ascii_case(currency) || self.quote.eq_ignore_ascii_case(currency)
    }

    /// Whether three pairs chain as `X/Q → X/Y → Y/Q`: buy X with Q,
    /// sell X for Y, sell Y back into Q.
    ///
    /// This is the only rotation the triangular return formula models.
    pub fn forms_rotation(first: &TradingPair, second: &TradingPair, third: &TradingPair) -> bool {
        first.base == second.base && second.quote == third.base && third.quote == first.quote
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| ScanError::InvalidSymbol(s.to_string()))?;
        let (base, quote) = (base.trim(), quote.trim());
        if base.is_empty() || quote.is_empty() || quote.contains('/') {
            return Err(ScanError::InvalidSymbol(s.to_string()));
        }
        Ok(Self::new(base, quote))
    }
}

impl TryFrom<String> for TradingPair {
    type Error = ScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TradingPair> for String {
    fn from(pair: TradingPair) -> Self {
        pair.to_string()
    }
}

// ---------------------------------------------------------------------------
// Price quote
// ---------------------------------------------------------------------------

/// Top-of-book snapshot for one (exchange, symbol) at sample time.
///
/// Either side may be missing when that side of the book is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriceQuote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl PriceQuote {
    pub fn new(bid: Decimal, ask: Decimal) -> Self {
        Self {
            bid: Some(bid),
            ask: Some(ask),
        }
    }

    /// Best bid, if present and strictly positive.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bid.filter(|p| *p > Decimal::ZERO)
    }

    /// Best ask, if present and strictly positive.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.ask.filter(|p| *p > Decimal::ZERO)
    }

    /// A quote is usable when at least one side carries a real price.
    pub fn is_usable(&self) -> bool {
        self.best_bid().is_some() || self.best_ask().is_some()
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |p: Option<Decimal>| p.map_or_else(|| "-".to_string(), |p| p.to_string());
        write!(f, "bid {} / ask {}", side(self.bid), side(self.ask))
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A detected arbitrage opportunity. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Opportunity {
    /// Buy on one exchange, sell on another.
    Simple {
        symbol: TradingPair,
        buy_exchange: String,
        sell_exchange: String,
        buy_price: Decimal,
        sell_price: Decimal,
        profit_percent: Decimal,
        timestamp: DateTime<Utc>,
    },
    /// Rotate through three pairs on a single exchange.
    Triangular {
        exchange: String,
        pairs: [TradingPair; 3],
        profit_percent: Decimal,
        timestamp: DateTime<Utc>,
    },
}

impl Opportunity {
    pub fn kind(&self) -> &'static str {
        match self {
            Opportunity::Simple { .. } => "simple",
            Opportunity::Triangular { .. } => "triangular",
        }
    }

    pub fn profit_percent(&self) -> Decimal {
        match self {
            Opportunity::Simple { profit_percent, .. }
            | Opportunity::Triangular { profit_percent, .. } => *profit_percent,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Opportunity::Simple { timestamp, .. } | Opportunity::Triangular { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opportunity::Simple {
                symbol,
                buy_exchange,
                sell_exchange,
                buy_price,
                sell_price,
                profit_percent,
                ..
            } => write!(
                f,
                "[simple] {symbol}: buy {buy_exchange} @ {buy_price}, sell {sell_exchange} @ {sell_price} ({:.4}%)",
                profit_percent
            ),
            Opportunity::Triangular {
                exchange,
                pairs,
                profit_percent,
                ..
            } => write!(
                f,
                "[triangular] {exchange}: {} → {} → {} ({:.4}%)",
                pairs[0], pairs[1], pairs[2], profit_percent
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ARBSCAN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// A quote or symbol listing could not be obtained this round.
    #[error("Quote unavailable ({exchange} {symbol}): {reason}")]
    QuoteUnavailable {
        exchange: String,
        symbol: String,
        reason: String,
    },

    /// A profit calculation hit a zero denominator, overflow or missing side.
    #[error("Degenerate computation: {0}")]
    ComputationDegenerate(String),

    /// An error escaped a scanning or reporting pass.
    #[error("Round failed: {0}")]
    RoundFailure(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    pub fn unavailable(exchange: &str, symbol: impl fmt::Display, reason: impl fmt::Display) -> Self {
        ScanError::QuoteUnavailable {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
