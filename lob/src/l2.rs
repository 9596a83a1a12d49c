//! Level 2 book state: sorted price-to-quantity maps rebuilt from
//! snapshot and delta records.

use crate::checksum;
use common::types::{OrderBookRecord, PriceLevel, RecordKind};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregated order book for one symbol.
///
/// Bids iterate descending by price, asks ascending, so the first entry of
/// either map is the top of book. Levels with zero quantity are never
/// stored; the zero is the wire's removal sentinel.
#[derive(Debug, Clone, Default)]
pub struct BookState {
    symbol: String,
    bids: BTreeMap<Reverse<OrderedFloat<f64>>, f64>,
    asks: BTreeMap<OrderedFloat<f64>, f64>,
    initialized: bool,
}

impl BookState {
    /// Create an empty book for `symbol`
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Symbol this book tracks
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether at least one snapshot has been applied.
    ///
    /// Applying updates before a snapshot is legal (replay does it), but
    /// metrics requested from an uninitialized book are logged.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Apply one record. Snapshots reset the book; updates compose with
    /// prior state. A zero-quantity update for an unknown price is a
    /// benign no-op.
    pub fn apply(&mut self, record: &OrderBookRecord) {
        match record.kind {
            RecordKind::Snapshot => {
                self.reset();
                for level in &record.bids {
                    if level.qty > 0.0 {
                        self.bids.insert(Reverse(OrderedFloat(level.price)), level.qty);
                    }
                }
                for level in &record.asks {
                    if level.qty > 0.0 {
                        self.asks.insert(OrderedFloat(level.price), level.qty);
                    }
                }
                self.initialized = true;
            }
            RecordKind::Update => {
                for level in &record.bids {
                    if level.qty > 0.0 {
                        self.bids.insert(Reverse(OrderedFloat(level.price)), level.qty);
                    } else {
                        self.bids.remove(&Reverse(OrderedFloat(level.price)));
                    }
                }
                for level in &record.asks {
                    if level.qty > 0.0 {
                        self.asks.insert(OrderedFloat(level.price), level.qty);
                    } else {
                        self.asks.remove(&OrderedFloat(level.price));
                    }
                }
            }
        }
    }

    /// Drop all levels and the initialized flag
    pub fn reset(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.initialized = false;
    }

    /// Highest bid as (price, qty)
    #[must_use]
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids
            .iter()
            .next()
            .map(|(&Reverse(OrderedFloat(price)), &qty)| (price, qty))
    }

    /// Lowest ask as (price, qty)
    #[must_use]
    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks
            .iter()
            .next()
            .map(|(&OrderedFloat(price), &qty)| (price, qty))
    }

    /// Top `n` bid levels, highest first
    #[must_use]
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .take(n)
            .map(|(&Reverse(OrderedFloat(price)), &qty)| PriceLevel::new(price, qty))
            .collect()
    }

    /// Top `n` ask levels, lowest first
    #[must_use]
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(n)
            .map(|(&OrderedFloat(price), &qty)| PriceLevel::new(price, qty))
            .collect()
    }

    /// Number of bid levels
    #[must_use]
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Number of ask levels
    #[must_use]
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Sum of bid quantity at prices >= `reference_price * (1 - bps/10000)`.
    /// Iteration stops at the first out-of-range level.
    #[must_use]
    pub fn bid_volume_within_bps(&self, reference_price: f64, bps: f64) -> f64 {
        let threshold = reference_price * (1.0 - bps / 10_000.0);
        let mut total = 0.0;
        for (&Reverse(OrderedFloat(price)), &qty) in &self.bids {
            if price >= threshold {
                total += qty;
            } else {
                break;
            }
        }
        total
    }

    /// Sum of ask quantity at prices <= `reference_price * (1 + bps/10000)`
    #[must_use]
    pub fn ask_volume_within_bps(&self, reference_price: f64, bps: f64) -> f64 {
        let threshold = reference_price * (1.0 + bps / 10_000.0);
        let mut total = 0.0;
        for (&OrderedFloat(price), &qty) in &self.asks {
            if price <= threshold {
                total += qty;
            } else {
                break;
            }
        }
        total
    }

    /// Total quantity over the top `n` bid levels
    #[must_use]
    pub fn bid_volume_top_n(&self, n: usize) -> f64 {
        self.bids.values().take(n).sum()
    }

    /// Total quantity over the top `n` ask levels
    #[must_use]
    pub fn ask_volume_top_n(&self, n: usize) -> f64 {
        self.asks.values().take(n).sum()
    }

    /// Whether best bid >= best ask. Reported, never repaired.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// CRC32 over this book's canonical top 10
    #[must_use]
    pub fn checksum(&self) -> u32 {
        checksum::crc32_top_of_book(&self.top_bids(10), &self.top_asks(10))
    }

    /// Compare the reconstructed top of book to the announced checksum.
    /// A book with an empty side passes trivially.
    #[must_use]
    pub fn validate_checksum(&self, expected: u32) -> bool {
        if self.bids.is_empty() || self.asks.is_empty() {
            debug!(symbol = %self.symbol, "checksum skipped: one-sided book");
            return true;
        }
        self.checksum() == expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: RecordKind, bids: &[(f64, f64)], asks: &[(f64, f64)]) -> OrderBookRecord {
        OrderBookRecord {
            timestamp: "2025-04-17 14:00:00.000".into(),
            symbol: "BTC/USD".into(),
            kind,
            bids: bids.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect(),
            asks: asks.iter().map(|&(p, q)| PriceLevel::new(p, q)).collect(),
            checksum: 0,
        }
    }

    #[test]
    fn snapshot_then_update() {
        // spec scenario: snapshot bids [(100,1),(99,2)], asks [(101,1),(102,2)];
        // update removes 99 and adds 98.
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(
            RecordKind::Snapshot,
            &[(100.0, 1.0), (99.0, 2.0)],
            &[(101.0, 1.0), (102.0, 2.0)],
        ));
        book.apply(&record(RecordKind::Update, &[(99.0, 0.0), (98.0, 3.0)], &[]));

        assert_eq!(book.best_bid(), Some((100.0, 1.0)));
        assert_eq!(book.best_ask(), Some((101.0, 1.0)));
        assert_eq!(book.bid_levels(), 2);
        assert_eq!(book.ask_levels(), 2);
        assert_eq!(
            book.top_bids(10),
            vec![PriceLevel::new(100.0, 1.0), PriceLevel::new(98.0, 3.0)]
        );

        let (bid, _) = book.best_bid().unwrap();
        let (ask, _) = book.best_ask().unwrap();
        assert!((ask - bid - 1.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_is_idempotent() {
        let snap = record(
            RecordKind::Snapshot,
            &[(100.0, 1.0), (99.0, 2.0)],
            &[(101.0, 1.5)],
        );
        let mut once = BookState::new("BTC/USD");
        once.apply(&snap);
        let mut twice = BookState::new("BTC/USD");
        twice.apply(&snap);
        twice.apply(&snap);

        assert_eq!(once.top_bids(10), twice.top_bids(10));
        assert_eq!(once.top_asks(10), twice.top_asks(10));
    }

    #[test]
    fn zero_qty_in_snapshot_is_ignored() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(
            RecordKind::Snapshot,
            &[(100.0, 1.0), (99.0, 0.0)],
            &[(101.0, 1.0)],
        ));
        assert_eq!(book.bid_levels(), 1);
    }

    #[test]
    fn zero_qty_update_for_unknown_price_is_noop() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(RecordKind::Snapshot, &[(100.0, 1.0)], &[(101.0, 1.0)]));
        book.apply(&record(RecordKind::Update, &[(95.0, 0.0)], &[(110.0, 0.0)]));

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
        assert_eq!(book.best_bid(), Some((100.0, 1.0)));
    }

    #[test]
    fn update_on_empty_book_is_legal() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(RecordKind::Update, &[(100.0, 1.0)], &[]));

        assert!(!book.is_initialized());
        assert_eq!(book.best_bid(), Some((100.0, 1.0)));
    }

    #[test]
    fn deltas_fold_like_state() {
        // Applying snapshot + deltas one by one equals folding all
        // non-cancelling deltas onto the snapshot.
        let snap = record(RecordKind::Snapshot, &[(100.0, 1.0)], &[(101.0, 1.0)]);
        let deltas = [
            record(RecordKind::Update, &[(99.5, 2.0)], &[]),
            record(RecordKind::Update, &[(99.5, 0.0)], &[(101.5, 3.0)]),
            record(RecordKind::Update, &[(99.0, 4.0)], &[(101.5, 1.0)]),
        ];

        let mut incremental = BookState::new("BTC/USD");
        incremental.apply(&snap);
        for d in &deltas {
            incremental.apply(d);
        }

        let mut folded = BookState::new("BTC/USD");
        folded.apply(&record(
            RecordKind::Snapshot,
            &[(100.0, 1.0), (99.0, 4.0)],
            &[(101.0, 1.0), (101.5, 1.0)],
        ));

        assert_eq!(incremental.top_bids(10), folded.top_bids(10));
        assert_eq!(incremental.top_asks(10), folded.top_asks(10));
    }

    #[test]
    fn volume_within_bps_stops_at_threshold() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(
            RecordKind::Snapshot,
            &[(10_000.0, 1.0), (9_995.0, 2.0), (9_900.0, 50.0)],
            &[(10_001.0, 1.0), (10_006.0, 2.0), (10_100.0, 50.0)],
        ));

        // 10 bps of 10000 = 10; bids >= 9990, asks <= 10010
        assert!((book.bid_volume_within_bps(10_000.0, 10.0) - 3.0).abs() < 1e-12);
        assert!((book.ask_volume_within_bps(10_000.0, 10.0) - 3.0).abs() < 1e-12);
        assert!((book.bid_volume_top_n(2) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn checksum_matches_announced_after_apply() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(
            RecordKind::Snapshot,
            &[(100.0, 1.0), (99.0, 2.0)],
            &[(101.0, 1.0), (102.0, 2.0)],
        ));
        let announced = crate::checksum::crc32_top_of_book(&book.top_bids(10), &book.top_asks(10));

        assert!(book.validate_checksum(announced));
        assert!(!book.validate_checksum(announced.wrapping_add(1)));
    }

    #[test]
    fn checksum_mismatch_is_non_destructive() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(RecordKind::Snapshot, &[(100.0, 1.0)], &[(101.0, 1.0)]));
        assert!(!book.validate_checksum(1));
        // state untouched; subsequent frames still apply
        book.apply(&record(RecordKind::Update, &[(99.0, 2.0)], &[]));
        assert_eq!(book.best_bid(), Some((100.0, 1.0)));
        assert_eq!(book.bid_levels(), 2);
    }

    #[test]
    fn crossed_book_detected_not_repaired() {
        let mut book = BookState::new("BTC/USD");
        book.apply(&record(RecordKind::Snapshot, &[(102.0, 1.0)], &[(101.0, 1.0)]));
        assert!(book.is_crossed());
        assert_eq!(book.best_bid(), Some((102.0, 1.0)));
    }
}
