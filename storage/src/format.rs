//! On-disk line formats: the ticker CSV, the order-book JSONL archives,
//! and the snapshot-metrics CSVs.
//!
//! Numeric CSV fields use adaptive precision — the shortest decimal that
//! round-trips the value, trailing zeros stripped. JSONL prices keep the
//! fixed 10-decimal rendering (and quantities 8) because that is exactly
//! the text the exchange's checksum hashes.

use common::types::{Level3Order, Level3Record, OrderBookRecord, TickerRecord};
use lob::{Level3SnapshotMetrics, SnapshotMetrics};
use std::fmt::Write as _;

/// A record type with a one-line on-disk rendering
pub trait LineFormat: Send + 'static {
    /// The record being persisted
    type Record: Clone + Send + 'static;
    /// File extension including the dot
    const EXTENSION: &'static str;
    /// Header line, written once per segment before the first record
    fn header() -> Option<&'static str>;
    /// Append the record's line (without terminator) to `out`
    fn write_line(record: &Self::Record, out: &mut String);
    /// Symbol the record belongs to, for per-symbol fan-out
    fn symbol(record: &Self::Record) -> &str;
}

/// Shortest round-trip decimal rendering of `value`, no trailing zeros
#[must_use]
pub fn fmt_adaptive(value: f64) -> String {
    value.to_string()
}

/// Escape the six JSON control escapes plus backslash and double quote
pub fn escape_json_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
}

/// Ticker CSV (Level 1 capture)
pub struct TickerCsv;

impl LineFormat for TickerCsv {
    type Record = TickerRecord;
    const EXTENSION: &'static str = ".csv";

    fn header() -> Option<&'static str> {
        Some("timestamp,pair,type,bid,bid_qty,ask,ask_qty,last,volume,vwap,low,high,change,change_pct")
    }

    fn write_line(r: &TickerRecord, out: &mut String) {
        let _ = write!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            r.timestamp,
            r.pair,
            r.kind,
            fmt_adaptive(r.bid),
            fmt_adaptive(r.bid_qty),
            fmt_adaptive(r.ask),
            fmt_adaptive(r.ask_qty),
            fmt_adaptive(r.last),
            fmt_adaptive(r.volume),
            fmt_adaptive(r.vwap),
            fmt_adaptive(r.low),
            fmt_adaptive(r.high),
            fmt_adaptive(r.change),
            fmt_adaptive(r.change_pct),
        );
    }

    fn symbol(r: &TickerRecord) -> &str {
        &r.pair
    }
}

/// Level 2 order-book JSONL archive
pub struct BookJsonl;

impl LineFormat for BookJsonl {
    type Record = OrderBookRecord;
    const EXTENSION: &'static str = ".jsonl";

    fn header() -> Option<&'static str> {
        None
    }

    fn write_line(r: &OrderBookRecord, out: &mut String) {
        out.push_str("{\"timestamp\":\"");
        escape_json_into(&r.timestamp, out);
        out.push_str("\",\"channel\":\"book\",\"type\":\"");
        out.push_str(r.kind.as_str());
        out.push_str("\",\"data\":{\"symbol\":\"");
        escape_json_into(&r.symbol, out);
        out.push_str("\",\"bids\":");
        write_levels(&r.bids, out);
        out.push_str(",\"asks\":");
        write_levels(&r.asks, out);
        let _ = write!(out, ",\"checksum\":{}}}}}", r.checksum);
    }

    fn symbol(r: &OrderBookRecord) -> &str {
        &r.symbol
    }
}

fn write_levels(levels: &[common::types::PriceLevel], out: &mut String) {
    out.push('[');
    for (i, level) in levels.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "[{:.10},{:.8}]", level.price, level.qty);
    }
    out.push(']');
}

/// Level 3 order-book JSONL archive
pub struct Level3Jsonl;

impl LineFormat for Level3Jsonl {
    type Record = Level3Record;
    const EXTENSION: &'static str = ".jsonl";

    fn header() -> Option<&'static str> {
        None
    }

    fn write_line(r: &Level3Record, out: &mut String) {
        out.push_str("{\"timestamp\":\"");
        escape_json_into(&r.timestamp, out);
        out.push_str("\",\"channel\":\"level3\",\"type\":\"");
        out.push_str(r.kind.as_str());
        out.push_str("\",\"data\":{\"symbol\":\"");
        escape_json_into(&r.symbol, out);
        out.push_str("\",\"bids\":");
        write_orders(&r.bids, out);
        out.push_str(",\"asks\":");
        write_orders(&r.asks, out);
        let _ = write!(out, ",\"checksum\":{}}}}}", r.checksum);
    }

    fn symbol(r: &Level3Record) -> &str {
        &r.symbol
    }
}

fn write_orders(orders: &[Level3Order], out: &mut String) {
    out.push('[');
    for (i, order) in orders.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('{');
        if let Some(event) = order.event {
            out.push_str("\"event\":\"");
            out.push_str(event.as_str());
            out.push_str("\",");
        }
        out.push_str("\"order_id\":\"");
        escape_json_into(&order.order_id, out);
        let _ = write!(
            out,
            "\",\"limit_price\":{:.10},\"order_qty\":{:.8},\"timestamp\":\"",
            order.limit_price, order.order_qty
        );
        escape_json_into(&order.timestamp, out);
        out.push_str("\"}");
    }
    out.push(']');
}

/// Level 2 snapshot-metrics CSV
pub struct SnapshotCsv;

impl LineFormat for SnapshotCsv {
    type Record = SnapshotMetrics;
    const EXTENSION: &'static str = ".csv";

    fn header() -> Option<&'static str> {
        Some(
            "timestamp,symbol,best_bid,best_bid_qty,best_ask,best_ask_qty,spread,spread_bps,\
             mid_price,bid_volume_top10,ask_volume_top10,imbalance,depth_10_bps,depth_25_bps,\
             depth_50_bps",
        )
    }

    fn write_line(m: &SnapshotMetrics, out: &mut String) {
        let _ = write!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            m.timestamp,
            m.symbol,
            fmt_adaptive(m.best_bid),
            fmt_adaptive(m.best_bid_qty),
            fmt_adaptive(m.best_ask),
            fmt_adaptive(m.best_ask_qty),
            fmt_adaptive(m.spread),
            fmt_adaptive(m.spread_bps),
            fmt_adaptive(m.mid_price),
            fmt_adaptive(m.bid_volume_top10),
            fmt_adaptive(m.ask_volume_top10),
            fmt_adaptive(m.imbalance),
            fmt_adaptive(m.depth_10_bps),
            fmt_adaptive(m.depth_25_bps),
            fmt_adaptive(m.depth_50_bps),
        );
    }

    fn symbol(m: &SnapshotMetrics) -> &str {
        &m.symbol
    }
}

/// Level 3 snapshot-metrics CSV (order-count and flow-rate columns added)
pub struct Level3SnapshotCsv;

impl LineFormat for Level3SnapshotCsv {
    type Record = Level3SnapshotMetrics;
    const EXTENSION: &'static str = ".csv";

    fn header() -> Option<&'static str> {
        Some(
            "timestamp,symbol,best_bid,best_bid_qty,best_ask,best_ask_qty,spread,spread_bps,\
             mid_price,bid_volume_top10,ask_volume_top10,imbalance,depth_10_bps,depth_25_bps,\
             depth_50_bps,bid_order_count,ask_order_count,bid_orders_at_best,ask_orders_at_best,\
             avg_bid_order_size,avg_ask_order_size,add_events,modify_events,delete_events,\
             order_arrival_rate,order_cancel_rate",
        )
    }

    fn write_line(m: &Level3SnapshotMetrics, out: &mut String) {
        let _ = write!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            m.timestamp,
            m.symbol,
            fmt_adaptive(m.best_bid),
            fmt_adaptive(m.best_bid_qty),
            fmt_adaptive(m.best_ask),
            fmt_adaptive(m.best_ask_qty),
            fmt_adaptive(m.spread),
            fmt_adaptive(m.spread_bps),
            fmt_adaptive(m.mid_price),
            fmt_adaptive(m.bid_volume_top10),
            fmt_adaptive(m.ask_volume_top10),
            fmt_adaptive(m.imbalance),
            fmt_adaptive(m.depth_10_bps),
            fmt_adaptive(m.depth_25_bps),
            fmt_adaptive(m.depth_50_bps),
            m.bid_order_count,
            m.ask_order_count,
            m.bid_orders_at_best,
            m.ask_orders_at_best,
            fmt_adaptive(m.avg_bid_order_size),
            fmt_adaptive(m.avg_ask_order_size),
            m.add_events,
            m.modify_events,
            m.delete_events,
            fmt_adaptive(m.order_arrival_rate),
            fmt_adaptive(m.order_cancel_rate),
        );
    }

    fn symbol(m: &Level3SnapshotMetrics) -> &str {
        &m.symbol
    }
}
