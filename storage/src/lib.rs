//! Durable persistence for captured market data.
//!
//! Records buffer in memory and reach disk under a flush policy with two
//! OR-ed triggers (elapsed time, buffered bytes) and optional wall-clock
//! file segmentation (hourly/daily UTC). Formats are the analytics-facing
//! ones: flat CSV for ticker and snapshot metrics, JSON Lines for the raw
//! book streams. A writer that hits an I/O error degrades and drops
//! records instead of blocking the ingestion worker.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod format;
pub mod multi;
pub mod policy;
pub mod writer;

pub use format::{
    escape_json_into, fmt_adaptive, BookJsonl, Level3Jsonl, Level3SnapshotCsv, LineFormat,
    SnapshotCsv, TickerCsv,
};
pub use multi::{per_symbol_path, MultiFileWriter, Sink};
pub use policy::{
    insert_segment_key, FlushOutcome, FlushPolicy, FlushTarget, PolicyError, SegmentMode,
    DEFAULT_FLUSH_INTERVAL_SECS, DEFAULT_MEMORY_THRESHOLD_BYTES,
};
pub use writer::{write_history_csv, SegmentedWriter};
