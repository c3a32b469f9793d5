//! Triangular arbitrage scanner.
//!
//! For each exchange:
//! 1. list tradable symbols,
//! 2. group them by configured currency (capped per currency),
//! 3. fetch each candidate's quote once, with bounded concurrency,
//! 4. walk every i<j<k triple and compute the round-trip return
//!    `notional / ask₁ × bid₂ × bid₃`.
//!
//! The return formula models the `X/Q → X/Y → Y/Q` rotation (buy X with Q,
//! sell X for Y, sell Y for Q) but does not by itself check that three
//! arbitrary legs chain that way. With `require_closed_loop` set, the
//! capped candidates of all groups are pooled and each triple is scored
//! only in the leg order that forms that rotation, if any.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, error, info};

use super::ledger::Ledger;
use crate::config::ScannerConfig;
use crate::exchanges::{fetch_quote_within, list_symbols_within, Exchange, MarketDataProvider};
use crate::types::{Opportunity, PriceQuote, ScanError, TradingPair};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TriangularSettings {
    pub min_profit: Decimal,
    pub notional: Decimal,
    pub base_currencies: Vec<String>,
    pub max_candidates_per_base: usize,
    pub require_closed_loop: bool,
    pub quote_timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl From<&ScannerConfig> for TriangularSettings {
    fn from(cfg: &ScannerConfig) -> Self {
        Self {
            min_profit: cfg.min_profit(),
            notional: cfg.notional_amount(),
            base_currencies: cfg.base_currencies.iter().map(|c| c.to_uppercase()).collect(),
            max_candidates_per_base: cfg.max_candidates_per_base,
            require_closed_loop: cfg.require_closed_loop,
            quote_timeout: cfg.quote_timeout(),
            max_concurrent_fetches: cfg.max_concurrent_fetches,
        }
    }
}

// ---------------------------------------------------------------------------
// Profit math
// ---------------------------------------------------------------------------

/// Percentage return of `notional / ask₁ × bid₂ × bid₃` against `notional`.
///
/// Any missing side, zero denominator or overflow is `ComputationDegenerate`.
pub fn round_trip_profit(
    notional: Decimal,
    first: &PriceQuote,
    second: &PriceQuote,
    third: &PriceQuote,
) -> Result<Decimal, ScanError> {
    let degenerate = |what: &str| ScanError::ComputationDegenerate(what.to_string());

    let ask1 = first.best_ask().ok_or_else(|| degenerate("first leg has no ask"))?;
    let bid2 = second.best_bid().ok_or_else(|| degenerate("second leg has no bid"))?;
    let bid3 = third.best_bid().ok_or_else(|| degenerate("third leg has no bid"))?;

    let final_amount = notional
        .checked_div(ask1)
        .and_then(|a| a.checked_mul(bid2))
        .and_then(|a| a.checked_mul(bid3))
        .ok_or_else(|| degenerate("round trip overflowed"))?;

    (final_amount - notional)
        .checked_div(notional)
        .and_then(|r| r.checked_mul(dec!(100)))
        .ok_or_else(|| degenerate("zero notional"))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Outcome of one triangular pass over all exchanges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriangularRound {
    pub found: usize,
    pub exchanges_scanned: usize,
    pub exchanges_failed: usize,
}

pub struct TriangularScanner {
    settings: TriangularSettings,
}

impl TriangularScanner {
    pub fn new(settings: TriangularSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TriangularSettings {
        &self.settings
    }

    /// Scan every exchange concurrently and append what is found.
    ///
    /// An exchange whose symbol listing fails is logged and skipped; the
    /// others still complete.
    pub async fn scan(&self, exchanges: &[Exchange], ledger: &mut Ledger) -> TriangularRound {
        let results = join_all(exchanges.iter().map(|ex| self.scan_exchange(ex.as_ref()))).await;

        let mut round = TriangularRound::default();
        for (ex, result) in exchanges.iter().zip(results) {
            match result {
                Ok(found) => {
                    round.exchanges_scanned += 1;
                    round.found += found.len();
                    ledger.extend(found);
                }
                Err(e) => {
                    round.exchanges_failed += 1;
                    error!(exchange = ex.name(), error = %e, "Triangular scan aborted for exchange");
                }
            }
        }
        round
    }

    /// Scan a single exchange.
    pub async fn scan_exchange(
        &self,
        exchange: &dyn MarketDataProvider,
    ) -> Result<Vec<Opportunity>, ScanError> {
        let symbols = list_symbols_within(exchange, self.settings.quote_timeout).await?;
        let groups = self.candidate_groups(&symbols);

        let unique: BTreeSet<&TradingPair> = groups.iter().flat_map(|(_, pairs)| pairs).collect();
        let quotes = self.fetch_quotes(exchange, unique).await;

        debug!(
            exchange = exchange.name(),
            symbols = symbols.len(),
            candidates = quotes.len(),
            "Triangular candidates quoted"
        );

        let found = self.evaluate(exchange.name(), &groups, &quotes, Utc::now());
        for opp in &found {
            if let Opportunity::Triangular { pairs, profit_percent, .. } = opp {
                info!(
                    exchange = exchange.name(),
                    leg1 = %pairs[0],
                    leg2 = %pairs[1],
                    leg3 = %pairs[2],
                    profit_pct = %profit_percent.round_dp(4),
                    "Triangular arbitrage found"
                );
            }
        }
        Ok(found)
    }

    /// Group symbols by configured currency.
    ///
    /// Symbols are sorted first so enumeration order is stable across
    /// rounds; each group is truncated to `max_candidates_per_base`.
    pub fn candidate_groups(&self, symbols: &[TradingPair]) -> Vec<(String, Vec<TradingPair>)> {
        let mut sorted = symbols.to_vec();
        sorted.sort();
        sorted.dedup();

        self.settings
            .base_currencies
            .iter()
            .map(|currency| {
                let candidates: Vec<TradingPair> = sorted
                    .iter()
                    .filter(|pair| pair.has_currency(currency))
                    .take(self.settings.max_candidates_per_base)
                    .cloned()
                    .collect();
                (currency.clone(), candidates)
            })
            .collect()
    }

    async fn fetch_quotes(
        &self,
        exchange: &dyn MarketDataProvider,
        pairs: BTreeSet<&TradingPair>,
    ) -> HashMap<TradingPair, PriceQuote> {
        let timeout = self.settings.quote_timeout;

        stream::iter(pairs)
            .map(|pair| async move { (pair, fetch_quote_within(exchange, pair, timeout).await) })
            .buffer_unordered(self.settings.max_concurrent_fetches)
            .filter_map(|(pair, result)| async move {
                match result {
                    Ok(quote) => Some((pair.clone(), quote)),
                    Err(e) => {
                        debug!(error = %e, "Skipping candidate without quote");
                        None
                    }
                }
            })
            .collect()
            .await
    }

    /// Walk every i<j<k triple of each group. Pure; used by `scan_exchange`.
    pub fn evaluate(
        &self,
        exchange: &str,
        groups: &[(String, Vec<TradingPair>)],
        quotes: &HashMap<TradingPair, PriceQuote>,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let mut walk = Walk::default();

        if self.settings.require_closed_loop {
            // A closed loop spans three currencies, none shared by all legs,
            // so it never sits inside a single currency group.
            let pool: Vec<&TradingPair> = groups
                .iter()
                .flat_map(|(_, pairs)| pairs)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let n = pool.len();
            for i in 0..n {
                for j in (i + 1)..n {
                    for k in (j + 1)..n {
                        for [a, b, c] in orderings(pool[i], pool[j], pool[k]) {
                            if TradingPair::forms_rotation(a, b, c) {
                                self.score(exchange, [a, b, c], quotes, now, &mut walk);
                            }
                        }
                    }
                }
            }
            debug!(exchange, candidates = n, "Closed-loop pool walked");
        } else {
            for (currency, pairs) in groups {
                let n = pairs.len();
                for i in 0..n {
                    for j in (i + 1)..n {
                        for k in (j + 1)..n {
                            self.score(
                                exchange,
                                [&pairs[i], &pairs[j], &pairs[k]],
                                quotes,
                                now,
                                &mut walk,
                            );
                        }
                    }
                }
                debug!(exchange, currency = %currency, candidates = n, "Currency group walked");
            }
        }

        debug!(
            exchange,
            evaluated = walk.evaluated,
            degenerate = walk.degenerate,
            found = walk.found.len(),
            "Triangular evaluation complete"
        );
        walk.found
    }

    /// Score one ordered triple, recording it when it clears the threshold.
    fn score(
        &self,
        exchange: &str,
        legs: [&TradingPair; 3],
        quotes: &HashMap<TradingPair, PriceQuote>,
        now: DateTime<Utc>,
        walk: &mut Walk,
    ) {
        let [p1, p2, p3] = legs;
        let (Some(q1), Some(q2), Some(q3)) = (quotes.get(p1), quotes.get(p2), quotes.get(p3))
        else {
            return;
        };

        walk.evaluated += 1;
        let profit_percent = match round_trip_profit(self.settings.notional, q1, q2, q3) {
            Ok(p) => p,
            Err(_) => {
                // counts as zero profit, which is never an opportunity
                walk.degenerate += 1;
                return;
            }
        };

        if profit_percent > self.settings.min_profit {
            walk.found.push(Opportunity::Triangular {
                exchange: exchange.to_string(),
                pairs: [p1.clone(), p2.clone(), p3.clone()],
                profit_percent,
                timestamp: now,
            });
        }
    }
}

#[derive(Default)]
struct Walk {
    found: Vec<Opportunity>,
    evaluated: usize,
    degenerate: usize,
}

fn orderings<'a>(
    a: &'a TradingPair,
    b: &'a TradingPair,
    c: &'a TradingPair,
) -> [[&'a TradingPair; 3]; 6] {
    [[a, b, c], [a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]]
}
