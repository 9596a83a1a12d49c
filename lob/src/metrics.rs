//! Microstructure metrics sampled from reconstructed book state

use crate::l2::BookState;
use crate::l3::Level3Book;
use tracing::warn;

/// Depth horizons (basis points around mid) reported in every metrics row
const DEPTH_BPS: [f64; 3] = [10.0, 25.0, 50.0];

/// One sampled row of Level 2 book metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotMetrics {
    /// Sample time (record timestamp driving the sample)
    pub timestamp: String,
    /// Trading pair
    pub symbol: String,
    /// Best bid price
    pub best_bid: f64,
    /// Quantity at best bid
    pub best_bid_qty: f64,
    /// Best ask price
    pub best_ask: f64,
    /// Quantity at best ask
    pub best_ask_qty: f64,
    /// best_ask - best_bid
    pub spread: f64,
    /// Spread relative to mid, in basis points
    pub spread_bps: f64,
    /// (best_bid + best_ask) / 2
    pub mid_price: f64,
    /// Total bid quantity over the top 10 levels
    pub bid_volume_top10: f64,
    /// Total ask quantity over the top 10 levels
    pub ask_volume_top10: f64,
    /// (bid_vol - ask_vol) / (bid_vol + ask_vol) over the top 10
    pub imbalance: f64,
    /// Two-sided quantity within 10 bps of mid
    pub depth_10_bps: f64,
    /// Two-sided quantity within 25 bps of mid
    pub depth_25_bps: f64,
    /// Two-sided quantity within 50 bps of mid
    pub depth_50_bps: f64,
}

impl SnapshotMetrics {
    /// Sample the current state. A book missing either side yields a row
    /// with only timestamp and symbol filled, matching the archival
    /// format's zero-fill convention.
    #[must_use]
    pub fn capture(state: &BookState, timestamp: &str) -> Self {
        let mut m = Self {
            timestamp: timestamp.to_string(),
            symbol: state.symbol().to_string(),
            ..Self::default()
        };

        if !state.is_initialized() {
            warn!(symbol = %state.symbol(), "metrics requested before first snapshot");
        }

        let (Some((bid, bid_qty)), Some((ask, ask_qty))) = (state.best_bid(), state.best_ask())
        else {
            return m;
        };

        m.best_bid = bid;
        m.best_bid_qty = bid_qty;
        m.best_ask = ask;
        m.best_ask_qty = ask_qty;
        m.spread = ask - bid;
        m.mid_price = (bid + ask) / 2.0;
        m.spread_bps = basis_points(m.spread, m.mid_price);

        m.bid_volume_top10 = state.bid_volume_top_n(10);
        m.ask_volume_top10 = state.ask_volume_top_n(10);
        let total = m.bid_volume_top10 + m.ask_volume_top10;
        if total > 0.0 {
            m.imbalance = (m.bid_volume_top10 - m.ask_volume_top10) / total;
        }

        let depths = DEPTH_BPS.map(|bps| {
            state.bid_volume_within_bps(m.mid_price, bps)
                + state.ask_volume_within_bps(m.mid_price, bps)
        });
        [m.depth_10_bps, m.depth_25_bps, m.depth_50_bps] = depths;

        m
    }
}

/// One sampled row of Level 3 book metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Level3SnapshotMetrics {
    /// Sample time
    pub timestamp: String,
    /// Trading pair
    pub symbol: String,
    /// Best bid price
    pub best_bid: f64,
    /// Total quantity of orders at best bid
    pub best_bid_qty: f64,
    /// Best ask price
    pub best_ask: f64,
    /// Total quantity of orders at best ask
    pub best_ask_qty: f64,
    /// best_ask - best_bid
    pub spread: f64,
    /// Spread relative to mid, in basis points
    pub spread_bps: f64,
    /// (best_bid + best_ask) / 2
    pub mid_price: f64,
    /// Bid quantity over the first 10 price levels
    pub bid_volume_top10: f64,
    /// Ask quantity over the first 10 price levels
    pub ask_volume_top10: f64,
    /// Signed top-10 volume ratio
    pub imbalance: f64,
    /// Two-sided quantity within 10 bps of mid
    pub depth_10_bps: f64,
    /// Two-sided quantity within 25 bps of mid
    pub depth_25_bps: f64,
    /// Two-sided quantity within 50 bps of mid
    pub depth_50_bps: f64,
    /// Open bid orders
    pub bid_order_count: u64,
    /// Open ask orders
    pub ask_order_count: u64,
    /// Orders resting at the best bid
    pub bid_orders_at_best: u64,
    /// Orders resting at the best ask
    pub ask_orders_at_best: u64,
    /// Mean bid order size
    pub avg_bid_order_size: f64,
    /// Mean ask order size
    pub avg_ask_order_size: f64,
    /// Successful adds in the sampling window
    pub add_events: u64,
    /// Successful modifies in the sampling window
    pub modify_events: u64,
    /// Successful deletes in the sampling window
    pub delete_events: u64,
    /// Adds per second over the window (filled by the sampler)
    pub order_arrival_rate: f64,
    /// Deletes per second over the window (filled by the sampler)
    pub order_cancel_rate: f64,
}

impl Level3SnapshotMetrics {
    /// Sample the current state. Flow rates default to the raw event
    /// counts; the snapshotter divides by its interval before writing.
    #[must_use]
    pub fn capture(book: &Level3Book, timestamp: &str) -> Self {
        let mut m = Self {
            timestamp: timestamp.to_string(),
            symbol: book.symbol().to_string(),
            ..Self::default()
        };

        let best_bid = book.best_bid();
        let best_ask = book.best_ask();

        if let Some((price, qty)) = best_bid {
            m.best_bid = price;
            m.best_bid_qty = qty;
            m.bid_orders_at_best = book.bid_orders_at_best() as u64;
        }
        if let Some((price, qty)) = best_ask {
            m.best_ask = price;
            m.best_ask_qty = qty;
            m.ask_orders_at_best = book.ask_orders_at_best() as u64;
        }
        if let (Some((bid, _)), Some((ask, _))) = (best_bid, best_ask) {
            m.spread = ask - bid;
            m.mid_price = (bid + ask) / 2.0;
            m.spread_bps = basis_points(m.spread, m.mid_price);
        }

        m.bid_volume_top10 = book.bid_volume_top_n(10);
        m.ask_volume_top10 = book.ask_volume_top_n(10);
        let total = m.bid_volume_top10 + m.ask_volume_top10;
        if total > 0.0 {
            m.imbalance = (m.bid_volume_top10 - m.ask_volume_top10) / total;
        }

        if m.mid_price > 0.0 {
            let depths = DEPTH_BPS.map(|bps| {
                book.bid_volume_within_bps(m.mid_price, bps)
                    + book.ask_volume_within_bps(m.mid_price, bps)
            });
            [m.depth_10_bps, m.depth_25_bps, m.depth_50_bps] = depths;
        }

        m.bid_order_count = book.bid_order_count() as u64;
        m.ask_order_count = book.ask_order_count() as u64;
        m.avg_bid_order_size = book.avg_bid_order_size();
        m.avg_ask_order_size = book.avg_ask_order_size();

        m.add_events = book.add_events();
        m.modify_events = book.modify_events();
        m.delete_events = book.delete_events();
        m.order_arrival_rate = m.add_events as f64;
        m.order_cancel_rate = m.delete_events as f64;

        m
    }
}

fn basis_points(value: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        return 0.0;
    }
    (value / reference) * 10_000.0
}
