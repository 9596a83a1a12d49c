//! Level 3 book state: every resting order individually, under a dual
//! index. A locator map takes an order id to its side and price; the
//! per-price buckets own the order data in arrival order. The two
//! representations stay in lockstep: every order in the locator map has
//! exactly one bucket entry on the correct side, and a bucket is removed
//! with its key when its last order goes.

use common::types::{Level3Record, OrderEvent, RecordKind, Side};
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One resting order inside a price bucket. The price lives in the bucket
/// key; the locator map carries it for O(log P) removal.
#[derive(Debug, Clone)]
struct OpenOrder {
    order_id: String,
    qty: f64,
    timestamp: String,
}

type Bucket = SmallVec<[OpenOrder; 4]>;

/// What one update record did to the book.
///
/// Event counters count successful applications only: an unknown-id
/// modify or delete is silently dropped (tracked in `unknown_dropped`),
/// and a modify arriving on the wrong side array is a protocol anomaly
/// that is reported and dropped, never migrated across sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Orders added
    pub added: u64,
    /// Orders modified in place or re-priced
    pub modified: u64,
    /// Orders removed
    pub deleted: u64,
    /// Modify/delete for an id we never saw (or a duplicate add)
    pub unknown_dropped: u64,
    /// Modify whose wire side disagrees with the resting order's side
    pub side_anomalies: u64,
}

/// Individual-order book for one symbol
#[derive(Debug, Clone, Default)]
pub struct Level3Book {
    symbol: String,
    locators: FxHashMap<String, (Side, f64)>,
    bids: BTreeMap<Reverse<OrderedFloat<f64>>, Bucket>,
    asks: BTreeMap<OrderedFloat<f64>, Bucket>,
    add_events: u64,
    modify_events: u64,
    delete_events: u64,
    unknown_dropped: u64,
    side_anomalies: u64,
}

impl Level3Book {
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

    /// Apply a record of either kind
    pub fn apply(&mut self, record: &Level3Record) -> ApplySummary {
        match record.kind {
            RecordKind::Snapshot => {
                self.apply_snapshot(record);
                ApplySummary::default()
            }
            RecordKind::Update => self.apply_update(record),
        }
    }

    /// Replace all state with the orders in a snapshot record
    pub fn apply_snapshot(&mut self, record: &Level3Record) {
        self.clear();
        for order in &record.bids {
            self.insert(Side::Bid, &order.order_id, order.limit_price, order.order_qty, &order.timestamp);
        }
        for order in &record.asks {
            self.insert(Side::Ask, &order.order_id, order.limit_price, order.order_qty, &order.timestamp);
        }
    }

    /// Apply the add/modify/delete items of an update record.
    /// The side of each item is carried by which array it arrived in.
    pub fn apply_update(&mut self, record: &Level3Record) -> ApplySummary {
        let mut summary = ApplySummary::default();
        for (side, orders) in [(Side::Bid, &record.bids), (Side::Ask, &record.asks)] {
            for order in orders {
                match order.event {
                    Some(OrderEvent::Add) => self.add(side, order, &mut summary),
                    Some(OrderEvent::Modify) => self.modify(side, order, &mut summary),
                    Some(OrderEvent::Delete) => self.delete(order, &mut summary),
                    None => {}
                }
            }
        }
        summary
    }

    fn add(&mut self, side: Side, order: &common::types::Level3Order, summary: &mut ApplySummary) {
        if self.locators.contains_key(&order.order_id) {
            debug!(symbol = %self.symbol, order_id = %order.order_id, "duplicate add dropped");
            self.unknown_dropped += 1;
            summary.unknown_dropped += 1;
            return;
        }
        self.insert(side, &order.order_id, order.limit_price, order.order_qty, &order.timestamp);
        self.add_events += 1;
        summary.added += 1;
    }

    fn modify(&mut self, wire_side: Side, order: &common::types::Level3Order, summary: &mut ApplySummary) {
        let Some(&(side, price)) = self.locators.get(&order.order_id) else {
            // Upstream already lost the add; fabricating one courts drift.
            self.unknown_dropped += 1;
            summary.unknown_dropped += 1;
            return;
        };
        if side != wire_side {
            warn!(
                symbol = %self.symbol,
                order_id = %order.order_id,
                resting = %side,
                wire = %wire_side,
                "modify arrived on the wrong side; dropped"
            );
            self.side_anomalies += 1;
            summary.side_anomalies += 1;
            return;
        }

        if (order.limit_price - price).abs() < f64::EPSILON {
            // Same price: update quantity in place, queue position kept.
            if let Some(entry) = self.bucket_entry_mut(side, price, &order.order_id) {
                entry.qty = order.order_qty;
            }
        } else {
            let Some(existing) = self.remove_from_bucket(side, price, &order.order_id) else {
                // Index drift would be a bug; the locator said it was here.
                warn!(symbol = %self.symbol, order_id = %order.order_id, "locator without bucket entry");
                self.locators.remove(&order.order_id);
                return;
            };
            self.locators
                .insert(order.order_id.clone(), (side, order.limit_price));
            let entry = OpenOrder {
                order_id: existing.order_id,
                qty: order.order_qty,
                timestamp: existing.timestamp,
            };
            match side {
                Side::Bid => self
                    .bids
                    .entry(Reverse(OrderedFloat(order.limit_price)))
                    .or_default()
                    .push(entry),
                Side::Ask => self
                    .asks
                    .entry(OrderedFloat(order.limit_price))
                    .or_default()
                    .push(entry),
            }
        }
        self.modify_events += 1;
        summary.modified += 1;
    }

    fn delete(&mut self, order: &common::types::Level3Order, summary: &mut ApplySummary) {
        let Some((side, price)) = self.locators.remove(&order.order_id) else {
            self.unknown_dropped += 1;
            summary.unknown_dropped += 1;
            return;
        };
        self.remove_from_bucket(side, price, &order.order_id);
        self.delete_events += 1;
        summary.deleted += 1;
    }

    fn insert(&mut self, side: Side, order_id: &str, price: f64, qty: f64, timestamp: &str) {
        self.locators.insert(order_id.to_string(), (side, price));
        let entry = OpenOrder {
            order_id: order_id.to_string(),
            qty,
            timestamp: timestamp.to_string(),
        };
        match side {
            Side::Bid => self.bids.entry(Reverse(OrderedFloat(price))).or_default().push(entry),
            Side::Ask => self.asks.entry(OrderedFloat(price)).or_default().push(entry),
        }
    }

    fn bucket_entry_mut(&mut self, side: Side, price: f64, order_id: &str) -> Option<&mut OpenOrder> {
        let bucket = match side {
            Side::Bid => self.bids.get_mut(&Reverse(OrderedFloat(price))),
            Side::Ask => self.asks.get_mut(&OrderedFloat(price)),
        }?;
        bucket.iter_mut().find(|o| o.order_id == order_id)
    }

    /// Remove one order from its bucket; drops the bucket key when it
    /// was the last order at that price.
    fn remove_from_bucket(&mut self, side: Side, price: f64, order_id: &str) -> Option<OpenOrder> {
        match side {
            Side::Bid => {
                let key = Reverse(OrderedFloat(price));
                let bucket = self.bids.get_mut(&key)?;
                let pos = bucket.iter().position(|o| o.order_id == order_id)?;
                let removed = bucket.remove(pos);
                if bucket.is_empty() {
                    self.bids.remove(&key);
                }
                Some(removed)
            }
            Side::Ask => {
                let key = OrderedFloat(price);
                let bucket = self.asks.get_mut(&key)?;
                let pos = bucket.iter().position(|o| o.order_id == order_id)?;
                let removed = bucket.remove(pos);
                if bucket.is_empty() {
                    self.asks.remove(&key);
                }
                Some(removed)
            }
        }
    }

    /// Drop every order. Event counters survive; the sampling window
    /// owns their lifecycle.
    pub fn clear(&mut self) {
        self.locators.clear();
        self.bids.clear();
        self.asks.clear();
    }

    /// Best bid as (price, total qty across its orders)
    #[must_use]
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids
            .iter()
            .next()
            .map(|(&Reverse(OrderedFloat(price)), bucket)| {
                (price, bucket.iter().map(|o| o.qty).sum())
            })
    }

    /// Best ask as (price, total qty across its orders)
    #[must_use]
    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks
            .iter()
            .next()
            .map(|(&OrderedFloat(price), bucket)| (price, bucket.iter().map(|o| o.qty).sum()))
    }

    /// Open orders on the bid side
    #[must_use]
    pub fn bid_order_count(&self) -> usize {
        self.bids.values().map(SmallVec::len).sum()
    }

    /// Open orders on the ask side
    #[must_use]
    pub fn ask_order_count(&self) -> usize {
        self.asks.values().map(SmallVec::len).sum()
    }

    /// Orders resting at the best bid
    #[must_use]
    pub fn bid_orders_at_best(&self) -> usize {
        self.bids.values().next().map_or(0, SmallVec::len)
    }

    /// Orders resting at the best ask
    #[must_use]
    pub fn ask_orders_at_best(&self) -> usize {
        self.asks.values().next().map_or(0, SmallVec::len)
    }

    /// Distinct bid price levels
    #[must_use]
    pub fn bid_price_levels(&self) -> usize {
        self.bids.len()
    }

    /// Distinct ask price levels
    #[must_use]
    pub fn ask_price_levels(&self) -> usize {
        self.asks.len()
    }

    /// Total orders tracked (size of the id index)
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.locators.len()
    }

    /// Total bid quantity over the first `n` price levels
    #[must_use]
    pub fn bid_volume_top_n(&self, n: usize) -> f64 {
        self.bids
            .values()
            .take(n)
            .map(|bucket| bucket.iter().map(|o| o.qty).sum::<f64>())
            .sum()
    }

    /// Total ask quantity over the first `n` price levels
    #[must_use]
    pub fn ask_volume_top_n(&self, n: usize) -> f64 {
        self.asks
            .values()
            .take(n)
            .map(|bucket| bucket.iter().map(|o| o.qty).sum::<f64>())
            .sum()
    }

    /// Bid quantity at prices >= `reference_price * (1 - bps/10000)`
    #[must_use]
    pub fn bid_volume_within_bps(&self, reference_price: f64, bps: f64) -> f64 {
        if reference_price <= 0.0 || bps <= 0.0 {
            return 0.0;
        }
        let threshold = reference_price * (1.0 - bps / 10_000.0);
        let mut total = 0.0;
        for (&Reverse(OrderedFloat(price)), bucket) in &self.bids {
            if price >= threshold {
                total += bucket.iter().map(|o| o.qty).sum::<f64>();
            } else {
                break;
            }
        }
        total
    }

    /// Ask quantity at prices <= `reference_price * (1 + bps/10000)`
    #[must_use]
    pub fn ask_volume_within_bps(&self, reference_price: f64, bps: f64) -> f64 {
        if reference_price <= 0.0 || bps <= 0.0 {
            return 0.0;
        }
        let threshold = reference_price * (1.0 + bps / 10_000.0);
        let mut total = 0.0;
        for (&OrderedFloat(price), bucket) in &self.asks {
            if price <= threshold {
                total += bucket.iter().map(|o| o.qty).sum::<f64>();
            } else {
                break;
            }
        }
        total
    }

    /// Mean bid order size, 0 when the side is empty
    #[must_use]
    pub fn avg_bid_order_size(&self) -> f64 {
        let count = self.bid_order_count();
        if count == 0 {
            return 0.0;
        }
        self.bid_volume_top_n(usize::MAX) / count as f64
    }

    /// Mean ask order size, 0 when the side is empty
    #[must_use]
    pub fn avg_ask_order_size(&self) -> f64 {
        let count = self.ask_order_count();
        if count == 0 {
            return 0.0;
        }
        self.ask_volume_top_n(usize::MAX) / count as f64
    }

    /// Successful adds since the last counter reset
    #[must_use]
    pub const fn add_events(&self) -> u64 {
        self.add_events
    }

    /// Successful modifies since the last counter reset
    #[must_use]
    pub const fn modify_events(&self) -> u64 {
        self.modify_events
    }

    /// Successful deletes since the last counter reset
    #[must_use]
    pub const fn delete_events(&self) -> u64 {
        self.delete_events
    }

    /// Modify/delete events dropped for unknown ids (session total)
    #[must_use]
    pub const fn unknown_dropped(&self) -> u64 {
        self.unknown_dropped
    }

    /// Wrong-side modifies dropped (session total)
    #[must_use]
    pub const fn side_anomalies(&self) -> u64 {
        self.side_anomalies
    }

    /// Zero the add/modify/delete counters; the snapshotter calls this
    /// between sampling intervals
    pub fn reset_event_counters(&mut self) {
        self.add_events = 0;
        self.modify_events = 0;
        self.delete_events = 0;
    }
}
