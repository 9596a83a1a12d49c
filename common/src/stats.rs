//! Per-symbol message counters kept by the ingestion clients

use crate::types::{Level3Record, OrderBookRecord, RecordKind, TickerRecord};

/// Counters for one symbol on the ticker channel
#[derive(Debug, Clone, Copy, Default)]
pub struct TickerStats {
    /// Snapshot messages seen
    pub snapshot_count: u64,
    /// Update messages seen
    pub update_count: u64,
    /// All messages seen
    pub total_messages: u64,
    /// Most recent last-trade price
    pub last: f64,
}

impl TickerStats {
    /// Fold one record into the counters
    pub fn record(&mut self, r: &TickerRecord) {
        self.total_messages += 1;
        match r.kind {
            RecordKind::Snapshot => self.snapshot_count += 1,
            RecordKind::Update => self.update_count += 1,
        }
        if r.last != 0.0 {
            self.last = r.last;
        }
    }
}

/// Counters and cached top-of-book for one symbol on the book channel
#[derive(Debug, Clone, Copy, Default)]
pub struct BookStats {
    /// Snapshot messages seen
    pub snapshot_count: u64,
    /// Update messages seen
    pub update_count: u64,
    /// All messages seen
    pub total_messages: u64,
    /// Best bid from the most recent message that carried one
    pub best_bid: f64,
    /// Quantity at that bid
    pub best_bid_qty: f64,
    /// Best ask from the most recent message that carried one
    pub best_ask: f64,
    /// Quantity at that ask
    pub best_ask_qty: f64,
    /// best_ask - best_bid
    pub spread: f64,
}

impl BookStats {
    /// Fold one record into the counters
    pub fn record(&mut self, r: &OrderBookRecord) {
        self.total_messages += 1;
        match r.kind {
            RecordKind::Snapshot => self.snapshot_count += 1,
            RecordKind::Update => self.update_count += 1,
        }
        if let (Some(bid), Some(ask)) = (r.bids.first(), r.asks.first()) {
            self.best_bid = bid.price;
            self.best_bid_qty = bid.qty;
            self.best_ask = ask.price;
            self.best_ask_qty = ask.qty;
            self.spread = ask.price - bid.price;
        }
    }
}

/// Counters for one symbol on the level3 channel.
///
/// Event counts here are wire-level (what the exchange sent); the
/// reconstructed book keeps its own applied-event counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Level3Stats {
    /// Snapshot messages seen
    pub snapshot_count: u64,
    /// Update messages seen
    pub update_count: u64,
    /// All messages seen
    pub total_messages: u64,
    /// `add` items seen on the wire
    pub add_events: u64,
    /// `modify` items seen on the wire
    pub modify_events: u64,
    /// `delete` items seen on the wire
    pub delete_events: u64,
    /// Open orders on the bid side (filled in from the book)
    pub bid_order_count: u64,
    /// Open orders on the ask side (filled in from the book)
    pub ask_order_count: u64,
    /// Best bid (filled in from the book)
    pub best_bid: f64,
    /// Best ask (filled in from the book)
    pub best_ask: f64,
    /// best_ask - best_bid
    pub spread: f64,
}

impl Level3Stats {
    /// Fold one record into the counters
    pub fn record(&mut self, r: &Level3Record) {
        use crate::types::OrderEvent;

        self.total_messages += 1;
        match r.kind {
            RecordKind::Snapshot => self.snapshot_count += 1,
            RecordKind::Update => self.update_count += 1,
        }
        for order in r.bids.iter().chain(r.asks.iter()) {
            match order.event {
                Some(OrderEvent::Add) => self.add_events += 1,
                Some(OrderEvent::Modify) => self.modify_events += 1,
                Some(OrderEvent::Delete) => self.delete_events += 1,
                None => {}
            }
        }
    }
}
