//! Opportunity ledger: everything found during one reporting interval.
//!
//! Owned by the scan loop and handed to scanners as `&mut Ledger`, so
//! there is exactly one writer and no locking.

use crate::types::Opportunity;

#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<Opportunity>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, opportunity: Opportunity) {
        self.entries.push(opportunity);
    }

    pub fn extend(&mut self, opportunities: impl IntoIterator<Item = Opportunity>) {
        self.entries.extend(opportunities);
    }

    /// Entries in discovery order.
    pub fn entries(&self) -> &[Opportunity] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries of each kind: `(simple, triangular)`.
    pub fn counts(&self) -> (usize, usize) {
        self.entries
            .iter()
            .fold((0, 0), |(simple, triangular), opp| match opp {
                Opportunity::Simple { .. } => (simple + 1, triangular),
                Opportunity::Triangular { .. } => (simple, triangular + 1),
            })
    }

    /// Keep only the newest `max` entries. Returns how many were dropped.
    pub fn retain_latest(&mut self, max: usize) -> usize {
        let excess = self.entries.len().saturating_sub(max);
        self.entries.drain(..excess);
        excess
    }

    /// Drop all entries, keeping the allocation for the next interval.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
