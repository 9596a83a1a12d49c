//! Channel behavior behind the generic ingestion client: subscription
//! message, per-symbol state application, statistics, and the output
//! format each channel persists to.

use crate::codec::WsEvent;
use common::stats::{BookStats, Level3Stats, TickerStats};
use common::types::{Level3Record, OrderBookRecord, TickerRecord};
use common::FeedError;
use lob::{BookState, Level3Book, Level3SnapshotMetrics, SnapshotMetrics};
use rustc_hash::FxHashMap;
use serde_json::json;
use storage::{
    BookJsonl, Level3Jsonl, Level3SnapshotCsv, LineFormat, SegmentedWriter, SnapshotCsv, TickerCsv,
};
use tracing::{debug, info, warn};

/// What one exchange channel contributes to [`crate::FeedClient`]
pub trait Channel: Send + 'static {
    /// Record type this channel produces
    type Record: Clone + Send + 'static;
    /// On-disk format the client's writer uses
    type Format: LineFormat<Record = Self::Record>;
    /// Per-symbol statistics exposed by the client
    type Stats: Clone + Send + 'static;

    /// Channel name in the subscribe message
    const NAME: &'static str;

    /// Build the subscription JSON sent right after the socket opens
    fn subscription(&self, symbols: &[String]) -> String;

    /// Startup validation before the worker spawns (e.g. token presence)
    fn prepare(&mut self, _symbols: &[String]) -> Result<(), FeedError> {
        Ok(())
    }

    /// Fold one decoded event into channel state. Records to hand to the
    /// consumer go into `records`; recoverable problems (checksum
    /// mismatches) into `reports`. An `Err` is fatal to the worker
    /// (subscription rejected).
    fn apply(
        &mut self,
        event: WsEvent,
        records: &mut Vec<Self::Record>,
        reports: &mut Vec<FeedError>,
    ) -> Result<(), FeedError>;

    /// Snapshot of the per-symbol statistics
    fn stats(&self) -> FxHashMap<String, Self::Stats>;

    /// Write the channel's current state to `path` (history CSV for the
    /// ticker, metrics rows for the books). Invariant violations found
    /// while sampling go into `reports`; their rows are still written.
    fn save_snapshot(&self, path: &str, reports: &mut Vec<FeedError>) -> Result<(), FeedError>;
}

/// Ack / heartbeat handling shared by all three channels. Returns `true`
/// when the event was consumed.
fn handle_control(channel: &str, event: &WsEvent) -> Result<bool, FeedError> {
    match event {
        WsEvent::SubscribeAck { success: true, .. } => {
            info!(channel, "subscription confirmed");
            Ok(true)
        }
        WsEvent::SubscribeAck {
            success: false,
            error,
        } => Err(FeedError::SubscribeFailed(
            error.clone().unwrap_or_else(|| "no reason given".into()),
        )),
        WsEvent::Heartbeat => Ok(true),
        WsEvent::Unknown => {
            debug!(channel, "unclassified frame dropped");
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Level 1 ticker: no book state, but a full session history for
/// `save_snapshot`
#[derive(Default)]
pub struct TickerChannel {
    history: Vec<TickerRecord>,
    stats: FxHashMap<String, TickerStats>,
}

impl TickerChannel {
    /// Empty ticker channel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records retained since start
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Channel for TickerChannel {
    type Record = TickerRecord;
    type Format = TickerCsv;
    type Stats = TickerStats;

    const NAME: &'static str = "ticker";

    fn subscription(&self, symbols: &[String]) -> String {
        json!({
            "method": "subscribe",
            "params": {
                "channel": Self::NAME,
                "symbol": symbols,
                "snapshot": true,
            }
        })
        .to_string()
    }

    fn apply(
        &mut self,
        event: WsEvent,
        records: &mut Vec<TickerRecord>,
        _reports: &mut Vec<FeedError>,
    ) -> Result<(), FeedError> {
        if handle_control(Self::NAME, &event)? {
            return Ok(());
        }
        let WsEvent::Ticker {
            records: decoded, ..
        } = event
        else {
            debug!(channel = Self::NAME, "frame for another channel dropped");
            return Ok(());
        };
        for record in decoded {
            self.stats.entry(record.pair.clone()).or_default().record(&record);
            self.history.push(record.clone());
            records.push(record);
        }
        Ok(())
    }

    fn stats(&self) -> FxHashMap<String, TickerStats> {
        self.stats.clone()
    }

    fn save_snapshot(&self, path: &str, _reports: &mut Vec<FeedError>) -> Result<(), FeedError> {
        storage::write_history_csv(path, &self.history)
    }
}

/// Level 2 book: one [`BookState`] per symbol, checksum-validated after
/// every application
pub struct BookChannel {
    depth: u32,
    validate_checksums: bool,
    books: FxHashMap<String, BookState>,
    stats: FxHashMap<String, BookStats>,
}

impl BookChannel {
    /// Book channel subscribing at `depth` levels
    #[must_use]
    pub fn new(depth: u32, validate_checksums: bool) -> Self {
        Self {
            depth,
            validate_checksums,
            books: FxHashMap::default(),
            stats: FxHashMap::default(),
        }
    }

    /// Reconstructed book for `symbol`, if any frames arrived
    #[must_use]
    pub fn book(&self, symbol: &str) -> Option<&BookState> {
        self.books.get(symbol)
    }
}

impl Channel for BookChannel {
    type Record = OrderBookRecord;
    type Format = BookJsonl;
    type Stats = BookStats;

    const NAME: &'static str = "book";

    fn subscription(&self, symbols: &[String]) -> String {
        json!({
            "method": "subscribe",
            "params": {
                "channel": Self::NAME,
                "symbol": symbols,
                "depth": self.depth,
                "snapshot": true,
            }
        })
        .to_string()
    }

    fn apply(
        &mut self,
        event: WsEvent,
        records: &mut Vec<OrderBookRecord>,
        reports: &mut Vec<FeedError>,
    ) -> Result<(), FeedError> {
        if handle_control(Self::NAME, &event)? {
            return Ok(());
        }
        let WsEvent::BookL2 {
            records: decoded, ..
        } = event
        else {
            debug!(channel = Self::NAME, "frame for another channel dropped");
            return Ok(());
        };
        for record in decoded {
            let state = self
                .books
                .entry(record.symbol.clone())
                .or_insert_with(|| BookState::new(record.symbol.clone()));
            state.apply(&record);

            if self.validate_checksums
                && record.checksum != 0
                && !state.validate_checksum(record.checksum)
            {
                reports.push(FeedError::ChecksumMismatch {
                    symbol: record.symbol.clone(),
                    computed: state.checksum(),
                    announced: record.checksum,
                });
            }

            self.stats
                .entry(record.symbol.clone())
                .or_default()
                .record(&record);
            records.push(record);
        }
        Ok(())
    }

    fn stats(&self) -> FxHashMap<String, BookStats> {
        self.stats.clone()
    }

    fn save_snapshot(&self, path: &str, reports: &mut Vec<FeedError>) -> Result<(), FeedError> {
        let mut writer = SegmentedWriter::<SnapshotCsv>::create(path);
        let now = common::time::utc_timestamp_millis();
        for state in self.books.values() {
            if let (Some((bid, _)), Some((ask, _))) = (state.best_bid(), state.best_ask()) {
                if bid >= ask {
                    reports.push(FeedError::CrossedBook {
                        symbol: state.symbol().to_string(),
                        bid,
                        ask,
                    });
                }
            }
            // row still written on a crossed book
            writer.write(&SnapshotMetrics::capture(state, &now))?;
        }
        writer.flush()
    }
}

/// Level 3 book: one [`Level3Book`] per symbol plus the auth token the
/// channel requires
pub struct Level3Channel {
    depth: u32,
    token: Option<String>,
    books: FxHashMap<String, Level3Book>,
    stats: FxHashMap<String, Level3Stats>,
}

impl Level3Channel {
    /// Level 3 channel subscribing at `depth` orders per side
    #[must_use]
    pub fn new(depth: u32) -> Self {
        Self {
            depth,
            token: None,
            books: FxHashMap::default(),
            stats: FxHashMap::default(),
        }
    }

    /// Install the token directly. Highest precedence.
    pub fn set_token(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if token.is_empty() {
            return false;
        }
        self.token = Some(token);
        true
    }

    /// Read the token from the first line of `path`
    pub fn set_token_from_file(&mut self, path: &str) -> bool {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let token = contents.lines().next().unwrap_or("").trim();
                if token.is_empty() {
                    warn!(path, "token file is empty");
                    return false;
                }
                self.token = Some(token.to_string());
                true
            }
            Err(e) => {
                warn!(path, error = %e, "cannot read token file");
                false
            }
        }
    }

    /// Read the token from `KRAKEN_WS_TOKEN`. Lowest precedence.
    pub fn set_token_from_env(&mut self) -> bool {
        match std::env::var("KRAKEN_WS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                self.token = Some(token.trim().to_string());
                true
            }
            _ => false,
        }
    }

    /// Whether any token source resolved
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Reconstructed book for `symbol`, if any frames arrived
    #[must_use]
    pub fn book(&self, symbol: &str) -> Option<&Level3Book> {
        self.books.get(symbol)
    }
}

impl Channel for Level3Channel {
    type Record = Level3Record;
    type Format = Level3Jsonl;
    type Stats = Level3Stats;

    const NAME: &'static str = "level3";

    fn subscription(&self, symbols: &[String]) -> String {
        json!({
            "method": "subscribe",
            "params": {
                "channel": Self::NAME,
                "symbol": symbols,
                "depth": self.depth,
                "snapshot": true,
                "token": self.token.as_deref().unwrap_or(""),
            }
        })
        .to_string()
    }

    fn prepare(&mut self, _symbols: &[String]) -> Result<(), FeedError> {
        if self.token.is_none() {
            return Err(FeedError::AuthMissing);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        event: WsEvent,
        records: &mut Vec<Level3Record>,
        reports: &mut Vec<FeedError>,
    ) -> Result<(), FeedError> {
        if handle_control(Self::NAME, &event)? {
            return Ok(());
        }
        let WsEvent::BookL3 {
            records: decoded, ..
        } = event
        else {
            debug!(channel = Self::NAME, "frame for another channel dropped");
            return Ok(());
        };
        for record in decoded {
            let book = self
                .books
                .entry(record.symbol.clone())
                .or_insert_with(|| Level3Book::new(record.symbol.clone()));
            let summary = book.apply(&record);
            // Unknown-id events stay silent (counter only); wrong-side
            // modifies are a reported protocol anomaly.
            if summary.unknown_dropped > 0 {
                debug!(
                    symbol = %record.symbol,
                    dropped = summary.unknown_dropped,
                    "events for unknown orders dropped"
                );
            }
            if summary.side_anomalies > 0 {
                reports.push(FeedError::WrongSideModify {
                    symbol: record.symbol.clone(),
                    count: summary.side_anomalies,
                });
            }

            self.stats
                .entry(record.symbol.clone())
                .or_default()
                .record(&record);
            records.push(record);
        }
        Ok(())
    }

    fn stats(&self) -> FxHashMap<String, Level3Stats> {
        let mut stats = self.stats.clone();
        for (symbol, entry) in &mut stats {
            if let Some(book) = self.books.get(symbol) {
                entry.bid_order_count = book.bid_order_count() as u64;
                entry.ask_order_count = book.ask_order_count() as u64;
                if let (Some((bid, _)), Some((ask, _))) = (book.best_bid(), book.best_ask()) {
                    entry.best_bid = bid;
                    entry.best_ask = ask;
                    entry.spread = ask - bid;
                }
            }
        }
        stats
    }

    fn save_snapshot(&self, path: &str, _reports: &mut Vec<FeedError>) -> Result<(), FeedError> {
        let mut writer = SegmentedWriter::<Level3SnapshotCsv>::create(path);
        let now = common::time::utc_timestamp_millis();
        for book in self.books.values() {
            writer.write(&Level3SnapshotMetrics::capture(book, &now))?;
        }
        writer.flush()
    }
}
