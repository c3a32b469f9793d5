//! Cross-exchange ("simple") arbitrage scanner.
//!
//! Samples one symbol on every configured exchange, then compares every
//! ordered (buy, sell) exchange pair: buy at A's ask, sell at B's bid.
//! Exchanges without a usable quote simply drop out of the round.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ledger::Ledger;
use crate::exchanges::{fetch_quote_within, Exchange};
use crate::types::{Opportunity, PriceQuote, TradingPair};

/// Gross percentage gained buying at `buy` and selling at `sell`.
///
/// `None` when either price is non-positive or the spread is not positive.
pub fn spread_profit(buy: Decimal, sell: Decimal) -> Option<Decimal> {
    if buy <= Decimal::ZERO || sell <= Decimal::ZERO || buy >= sell {
        return None;
    }
    (sell - buy).checked_div(buy)?.checked_mul(dec!(100))
}

pub struct SimpleScanner {
    min_profit: Decimal,
    quote_timeout: Duration,
}

impl SimpleScanner {
    pub fn new(min_profit: Decimal, quote_timeout: Duration) -> Self {
        Self {
            min_profit,
            quote_timeout,
        }
    }

    /// Scan one symbol across all exchanges and append what is found.
    ///
    /// Returns the number of opportunities recorded.
    pub async fn scan(
        &self,
        symbol: &TradingPair,
        exchanges: &[Exchange],
        ledger: &mut Ledger,
    ) -> usize {
        let quotes = self.collect_quotes(symbol, exchanges).await;
        let found = self.find_opportunities(symbol, &quotes, Utc::now());

        for opp in &found {
            if let Opportunity::Simple {
                buy_exchange,
                sell_exchange,
                buy_price,
                sell_price,
                profit_percent,
                ..
            } = opp
            {
                info!(
                    symbol = %symbol,
                    buy_exchange = %buy_exchange,
                    buy_price = %buy_price,
                    sell_exchange = %sell_exchange,
                    sell_price = %sell_price,
                    profit_pct = %profit_percent.round_dp(4),
                    "Simple arbitrage found"
                );
            }
        }

        let count = found.len();
        ledger.extend(found);
        count
    }

    /// Fetch `symbol` from every exchange concurrently. Failures are
    /// logged and omitted.
    async fn collect_quotes(
        &self,
        symbol: &TradingPair,
        exchanges: &[Exchange],
    ) -> Vec<(String, PriceQuote)> {
        let fetches = exchanges
            .iter()
            .map(|ex| fetch_quote_within(ex.as_ref(), symbol, self.quote_timeout));
        let results = join_all(fetches).await;

        exchanges
            .iter()
            .zip(results)
            .filter_map(|(ex, result)| match result {
                Ok(quote) => {
                    debug!(exchange = ex.name(), symbol = %symbol, %quote, "Quote received");
                    Some((ex.name().to_string(), quote))
                }
                Err(e) => {
                    warn!(exchange = ex.name(), symbol = %symbol, error = %e, "Excluding exchange from comparison");
                    None
                }
            })
            .collect()
    }

    /// Compare every ordered pair of quotes. Pure; used by `scan`.
    pub fn find_opportunities(
        &self,
        symbol: &TradingPair,
        quotes: &[(String, PriceQuote)],
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let mut found = Vec::new();

        for (i, (buy_exchange, buy_quote)) in quotes.iter().enumerate() {
            for (j, (sell_exchange, sell_quote)) in quotes.iter().enumerate() {
                if i == j || buy_exchange == sell_exchange {
                    continue;
                }

                let (Some(buy_price), Some(sell_price)) =
                    (buy_quote.best_ask(), sell_quote.best_bid())
                else {
                    continue;
                };

                let Some(profit_percent) = spread_profit(buy_price, sell_price) else {
                    continue;
                };

                if profit_percent > self.min_profit {
                    found.push(Opportunity::Simple {
                        symbol: symbol.clone(),
                        buy_exchange: buy_exchange.clone(),
                        sell_exchange: sell_exchange.clone(),
                        buy_price,
                        sell_price,
                        profit_percent,
                        timestamp: now,
                    });
                }
            }
        }

        found
    }
}
