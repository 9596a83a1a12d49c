//! Frame decoder for the exchange's WebSocket v2 channels.
//!
//! One UTF-8 text payload in, exactly one [`WsEvent`] out. Classification
//! sniffs the envelope (`method`, then `channel`/`type`) and then decodes
//! the payload items; unknown fields are tolerated everywhere and absent
//! numeric fields decode as 0. The same decoder reads live frames and the
//! persisted JSONL archive (whose `data` is a single object rather than a
//! batch array, and which carries its own timestamp).

use common::time;
use common::types::{
    Level3Order, Level3Record, OrderBookRecord, OrderEvent, PriceLevel, RecordKind, TickerRecord,
};
use common::FeedError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// Response to our subscribe request
    SubscribeAck {
        /// Whether the subscription was accepted
        success: bool,
        /// Exchange diagnostic on rejection
        error: Option<String>,
    },
    /// Liveness chatter; observational only
    Heartbeat,
    /// A batch of ticker records
    Ticker {
        /// Snapshot or update
        kind: RecordKind,
        /// One record per symbol in the frame
        records: Vec<TickerRecord>,
    },
    /// A batch of Level 2 book records
    BookL2 {
        /// Snapshot or update
        kind: RecordKind,
        /// One record per symbol in the frame
        records: Vec<OrderBookRecord>,
    },
    /// A batch of Level 3 book records
    BookL3 {
        /// Snapshot or update
        kind: RecordKind,
        /// One record per symbol in the frame
        records: Vec<Level3Record>,
    },
    /// Recognized JSON that matches no known channel; dropped with a log
    Unknown,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct WireTicker {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    bid: f64,
    #[serde(default)]
    bid_qty: f64,
    #[serde(default)]
    ask: f64,
    #[serde(default)]
    ask_qty: f64,
    #[serde(default)]
    last: f64,
    #[serde(default)]
    volume: f64,
    #[serde(default)]
    vwap: f64,
    #[serde(default)]
    low: f64,
    #[serde(default)]
    high: f64,
    #[serde(default)]
    change: f64,
    #[serde(default)]
    change_pct: f64,
}

/// Live frames carry levels as `{"price":p,"qty":q}` objects; the JSONL
/// archive stores the compact `[p,q]` form. Both decode.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireLevel {
    Object {
        #[serde(default)]
        price: f64,
        #[serde(default)]
        qty: f64,
    },
    Pair(f64, f64),
}

impl From<WireLevel> for PriceLevel {
    fn from(w: WireLevel) -> Self {
        match w {
            WireLevel::Object { price, qty } => Self::new(price, qty),
            WireLevel::Pair(price, qty) => Self::new(price, qty),
        }
    }
}

#[derive(Deserialize)]
struct WireBook {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    bids: Vec<WireLevel>,
    #[serde(default)]
    asks: Vec<WireLevel>,
    #[serde(default)]
    checksum: u32,
}

#[derive(Deserialize)]
struct WireOrder {
    #[serde(default)]
    event: Option<OrderEvent>,
    #[serde(default)]
    order_id: String,
    #[serde(default)]
    limit_price: f64,
    #[serde(default)]
    order_qty: f64,
    #[serde(default)]
    timestamp: String,
}

#[derive(Deserialize)]
struct WireLevel3 {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    bids: Vec<WireOrder>,
    #[serde(default)]
    asks: Vec<WireOrder>,
    #[serde(default)]
    checksum: u32,
}

/// Decode one text frame. `received_at` is the local UTC receive stamp
/// applied to every record; a frame that carries its own envelope
/// timestamp (the JSONL archive) keeps it instead.
pub fn decode(payload: &str, received_at: &str) -> Result<WsEvent, FeedError> {
    let envelope: Envelope =
        serde_json::from_str(payload).map_err(|e| FeedError::Decode(e.to_string()))?;

    if envelope.method.as_deref() == Some("subscribe") {
        return Ok(WsEvent::SubscribeAck {
            success: envelope.success.unwrap_or(false),
            error: envelope.error,
        });
    }

    let Some(channel) = envelope.channel.as_deref() else {
        debug!("frame without channel discarded");
        return Ok(WsEvent::Unknown);
    };
    if channel == "heartbeat" {
        return Ok(WsEvent::Heartbeat);
    }

    let Some(kind) = envelope.kind.as_deref().and_then(RecordKind::from_wire) else {
        debug!(channel, "frame with unrecognized type discarded");
        return Ok(WsEvent::Unknown);
    };
    let stamp = envelope.timestamp.as_deref().unwrap_or(received_at);
    let items = batch_items(envelope.data);

    match channel {
        "ticker" => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let t: WireTicker =
                    serde_json::from_value(item).map_err(|e| FeedError::Decode(e.to_string()))?;
                records.push(TickerRecord {
                    timestamp: stamp.to_string(),
                    pair: t.symbol,
                    kind,
                    bid: t.bid,
                    bid_qty: t.bid_qty,
                    ask: t.ask,
                    ask_qty: t.ask_qty,
                    last: t.last,
                    volume: t.volume,
                    vwap: t.vwap,
                    low: t.low,
                    high: t.high,
                    change: t.change,
                    change_pct: t.change_pct,
                });
            }
            Ok(WsEvent::Ticker { kind, records })
        }
        "book" => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let b: WireBook =
                    serde_json::from_value(item).map_err(|e| FeedError::Decode(e.to_string()))?;
                records.push(OrderBookRecord {
                    timestamp: stamp.to_string(),
                    symbol: b.symbol,
                    kind,
                    bids: b.bids.into_iter().map(PriceLevel::from).collect(),
                    asks: b.asks.into_iter().map(PriceLevel::from).collect(),
                    checksum: b.checksum,
                });
            }
            Ok(WsEvent::BookL2 { kind, records })
        }
        "level3" => {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                let l: WireLevel3 =
                    serde_json::from_value(item).map_err(|e| FeedError::Decode(e.to_string()))?;
                records.push(Level3Record {
                    timestamp: stamp.to_string(),
                    symbol: l.symbol,
                    kind,
                    bids: l.bids.into_iter().map(order_from_wire).collect(),
                    asks: l.asks.into_iter().map(order_from_wire).collect(),
                    checksum: l.checksum,
                });
            }
            Ok(WsEvent::BookL3 { kind, records })
        }
        other => {
            debug!(channel = other, "unknown channel discarded");
            Ok(WsEvent::Unknown)
        }
    }
}

fn order_from_wire(w: WireOrder) -> Level3Order {
    Level3Order {
        order_id: w.order_id,
        limit_price: w.limit_price,
        order_qty: w.order_qty,
        timestamp: w.timestamp,
        event: w.event,
    }
}

/// Live frames batch records in a `data` array; archive lines hold one
/// object.
fn batch_items(data: Option<Value>) -> Vec<Value> {
    match data {
        Some(Value::Array(items)) => items,
        Some(object @ Value::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

/// Decode one line of a Level 2 JSONL archive
pub fn decode_book_line(line: &str) -> Result<OrderBookRecord, FeedError> {
    match decode(line, &time::utc_timestamp_millis())? {
        WsEvent::BookL2 { mut records, .. } if records.len() == 1 => Ok(records.remove(0)),
        _ => Err(FeedError::Decode("not a single book record".into())),
    }
}

/// Decode one line of a Level 3 JSONL archive
pub fn decode_level3_line(line: &str) -> Result<Level3Record, FeedError> {
    match decode(line, &time::utc_timestamp_millis())? {
        WsEvent::BookL3 { mut records, .. } if records.len() == 1 => Ok(records.remove(0)),
        _ => Err(FeedError::Decode("not a single level3 record".into())),
    }
}

/// Channel named by a frame/line, if any. The snapshotter uses this to
/// pick the reconstructor for an archive.
#[must_use]
pub fn peek_channel(line: &str) -> Option<String> {
    let envelope: Envelope = serde_json::from_str(line).ok()?;
    envelope.channel
}
