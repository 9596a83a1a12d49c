//! Error taxonomy for the capture suite.
//!
//! Decoder, checksum, and state-delta problems are recovered locally;
//! connection, subscription, writer, and auth problems surface to the
//! consumer through the error callback. Nothing here is fatal to the
//! process — the tool wrappers decide whether to exit.

use thiserror::Error;

/// Everything that can go wrong between the socket and the disk
#[derive(Debug, Error)]
pub enum FeedError {
    /// A text frame was not valid JSON (or not a shape we understand)
    #[error("failed to decode frame: {0}")]
    Decode(String),

    /// The exchange rejected our subscription; no data will follow
    #[error("subscription rejected: {0}")]
    SubscribeFailed(String),

    /// The reconstructed top of book does not hash to the announced value
    #[error("checksum mismatch for {symbol}: computed {computed}, announced {announced}")]
    ChecksumMismatch {
        /// Symbol whose book diverged
        symbol: String,
        /// CRC32 computed over our reconstructed top 10
        computed: u32,
        /// CRC32 announced by the exchange
        announced: u32,
    },

    /// Best bid at or above best ask — a protocol violation we report
    /// without pruning state
    #[error("crossed book for {symbol}: bid {bid} >= ask {ask}")]
    CrossedBook {
        /// Symbol whose book crossed
        symbol: String,
        /// Best bid price
        bid: f64,
        /// Best ask price
        ask: f64,
    },

    /// A modify arrived on the opposite side of the resting order — a
    /// protocol anomaly; the order is dropped, never migrated across
    /// sides
    #[error("wrong-side modify for {symbol}: {count} event(s) dropped")]
    WrongSideModify {
        /// Symbol whose update carried the anomaly
        symbol: String,
        /// Anomalous events in the offending record
        count: u64,
    },

    /// The writer failed to open, write, or flush; it degrades and drops
    /// records rather than blocking ingestion
    #[error("writer I/O error: {0}")]
    WriterIo(#[from] std::io::Error),

    /// Closing a finished segment or opening its successor failed
    #[error("segment rotation failed: {0}")]
    SegmentRotation(String),

    /// The transport dropped; the worker exits and the caller decides
    /// whether to restart
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// No level3 auth token could be resolved
    #[error("no authentication token: set --token, --token-file, or KRAKEN_WS_TOKEN")]
    AuthMissing,

    /// The `--pairs` specification could not be materialized
    #[error("invalid pairs specification: {0}")]
    InputSpec(String),
}
