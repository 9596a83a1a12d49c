//! Common types and utilities for the Kraken market-data capture suite

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod errors;
pub mod stats;
pub mod time;
pub mod types;

pub use errors::FeedError;
pub use stats::{BookStats, Level3Stats, TickerStats};
pub use types::{
    Level3Order, Level3Record, OrderBookRecord, OrderEvent, PriceLevel, RecordKind, Side,
    TickerRecord,
};
