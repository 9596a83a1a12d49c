//! Record types for the Kraken WebSocket v2 ticker, book, and level3 channels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side (bids)
    Bid,
    /// Sell side (asks)
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "bid"),
            Self::Ask => write!(f, "ask"),
        }
    }
}

/// Whether a record carries a full snapshot or an incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Complete, authoritative state; replaces prior state
    Snapshot,
    /// Incremental change; composes with prior state
    Update,
}

impl RecordKind {
    /// Parse the wire `type` field. Anything other than `snapshot`/`update`
    /// is unknown to this protocol version.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "snapshot" => Some(Self::Snapshot),
            "update" => Some(Self::Update),
            _ => None,
        }
    }

    /// Wire spelling of this kind
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ticker observation from the `ticker` channel.
///
/// The timestamp is the client's receive time (UTC, millisecond precision);
/// absent wire fields decode as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRecord {
    /// Client receive time, `YYYY-MM-DD HH:MM:SS.mmm` UTC
    pub timestamp: String,
    /// Trading pair, e.g. `BTC/USD`
    pub pair: String,
    /// Snapshot or update
    pub kind: RecordKind,
    /// Best bid price
    pub bid: f64,
    /// Quantity at best bid
    pub bid_qty: f64,
    /// Best ask price
    pub ask: f64,
    /// Quantity at best ask
    pub ask_qty: f64,
    /// Last trade price
    pub last: f64,
    /// 24h traded volume
    pub volume: f64,
    /// 24h volume-weighted average price
    pub vwap: f64,
    /// 24h low
    pub low: f64,
    /// 24h high
    pub high: f64,
    /// 24h price change
    pub change: f64,
    /// 24h price change in percent
    pub change_pct: f64,
}

/// A single price level: price and aggregated quantity.
///
/// On the wire a quantity of 0 is the removal sentinel and is never stored
/// in book state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    pub price: f64,
    /// Aggregated quantity at this price
    pub qty: f64,
}

impl PriceLevel {
    /// Create a price level
    #[must_use]
    pub const fn new(price: f64, qty: f64) -> Self {
        Self { price, qty }
    }
}

/// One Level 2 book message (snapshot or delta) for a single symbol.
///
/// Bids are ordered descending by price, asks ascending, exactly as the
/// exchange emits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookRecord {
    /// Client receive time
    pub timestamp: String,
    /// Trading pair
    pub symbol: String,
    /// Snapshot or update
    pub kind: RecordKind,
    /// Bid levels, descending by price
    pub bids: Vec<PriceLevel>,
    /// Ask levels, ascending by price
    pub asks: Vec<PriceLevel>,
    /// CRC32 announced by the exchange over the top of book
    pub checksum: u32,
}

/// Order event discriminator carried on level3 update items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEvent {
    /// New order enters the book
    Add,
    /// Price and/or quantity of an existing order changed
    Modify,
    /// Order left the book
    Delete,
}

impl OrderEvent {
    /// Wire spelling of this event
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// A single resting order from the `level3` channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level3Order {
    /// Exchange-assigned order id, unique within the session
    pub order_id: String,
    /// Limit price
    pub limit_price: f64,
    /// Remaining quantity
    pub order_qty: f64,
    /// Exchange timestamp for this order (RFC3339), preserved from the wire
    pub timestamp: String,
    /// Event discriminator; only present on update records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<OrderEvent>,
}

/// One Level 3 message (snapshot or delta) for a single symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level3Record {
    /// Client receive time
    pub timestamp: String,
    /// Trading pair
    pub symbol: String,
    /// Snapshot or update
    pub kind: RecordKind,
    /// Bid-side orders
    pub bids: Vec<Level3Order>,
    /// Ask-side orders
    pub asks: Vec<Level3Order>,
    /// CRC32 announced by the exchange
    pub checksum: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_wire_round_trip() {
        assert_eq!(RecordKind::from_wire("snapshot"), Some(RecordKind::Snapshot));
        assert_eq!(RecordKind::from_wire("update"), Some(RecordKind::Update));
        assert_eq!(RecordKind::from_wire("trade"), None);
        assert_eq!(RecordKind::Snapshot.as_str(), "snapshot");
    }

    #[test]
    fn order_event_serde_uses_lowercase() {
        let json = serde_json::to_string(&OrderEvent::Modify).unwrap();
        assert_eq!(json, "\"modify\"");
        let back: OrderEvent = serde_json::from_str("\"delete\"").unwrap();
        assert_eq!(back, OrderEvent::Delete);
    }
}
