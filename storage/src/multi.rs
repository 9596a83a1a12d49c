//! Per-symbol fan-out over [`SegmentedWriter`] and the sink enum the
//! ingestion clients hold.

use crate::format::LineFormat;
use crate::policy::SegmentMode;
use crate::writer::SegmentedWriter;
use common::FeedError;
use rustc_hash::FxHashMap;

/// One writer per symbol, created on first sight of each symbol.
/// Configuration set here is forwarded to every member, present and
/// future.
pub struct MultiFileWriter<F: LineFormat> {
    base_path: String,
    flush_interval: u64,
    memory_threshold: usize,
    mode: SegmentMode,
    writers: FxHashMap<String, SegmentedWriter<F>>,
}

impl<F: LineFormat> MultiFileWriter<F> {
    /// Fan-out rooted at `base_path`; member files get the symbol token
    /// inserted before the extension
    #[must_use]
    pub fn create(base_path: &str) -> Self {
        Self {
            base_path: base_path.to_string(),
            flush_interval: crate::policy::DEFAULT_FLUSH_INTERVAL_SECS,
            memory_threshold: crate::policy::DEFAULT_MEMORY_THRESHOLD_BYTES,
            mode: SegmentMode::None,
            writers: FxHashMap::default(),
        }
    }

    /// Forward the time trigger to all members
    pub fn set_flush_interval(&mut self, secs: u64) {
        self.flush_interval = secs;
        for writer in self.writers.values_mut() {
            writer.set_flush_interval(secs);
        }
    }

    /// Forward the memory trigger to all members
    pub fn set_memory_threshold(&mut self, bytes: usize) {
        self.memory_threshold = bytes;
        for writer in self.writers.values_mut() {
            writer.set_memory_threshold(bytes);
        }
    }

    /// Forward the segmentation mode to all members
    pub fn set_segment_mode(&mut self, mode: SegmentMode) -> Result<(), FeedError> {
        self.mode = mode;
        for writer in self.writers.values_mut() {
            writer.set_segment_mode(mode)?;
        }
        Ok(())
    }

    /// Route one record to its symbol's writer
    pub fn write(&mut self, record: &F::Record) -> Result<bool, FeedError> {
        let symbol = F::symbol(record);
        if !self.writers.contains_key(symbol) {
            let path = per_symbol_path(&self.base_path, symbol, F::EXTENSION);
            let mut writer = SegmentedWriter::<F>::create(&path);
            writer.set_flush_interval(self.flush_interval);
            writer.set_memory_threshold(self.memory_threshold);
            writer.set_segment_mode(self.mode)?;
            self.writers.insert(symbol.to_string(), writer);
        }
        match self.writers.get_mut(symbol) {
            Some(writer) => writer.write(record),
            None => Ok(false),
        }
    }

    /// Drain every member
    pub fn flush(&mut self) -> Result<(), FeedError> {
        let mut first_err = None;
        for writer in self.writers.values_mut() {
            if let Err(e) = writer.flush() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Files opened so far
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.writers.len()
    }

    /// Records written across all members
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.writers.values().map(SegmentedWriter::records_written).sum()
    }

    /// Whether every member writer has degraded (and at least one exists)
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.writers.is_empty() && self.writers.values().all(SegmentedWriter::is_degraded)
    }
}

/// `"book.jsonl"` + `"BTC/USD"` -> `"book_BTC_USD.jsonl"`. The slash is
/// the only character the exchange puts in a pair name that a filesystem
/// refuses.
#[must_use]
pub fn per_symbol_path(base: &str, symbol: &str, extension: &str) -> String {
    let sanitized = symbol.replace('/', "_");
    let stem = match base.rfind(extension) {
        Some(pos) if pos + extension.len() == base.len() => &base[..pos],
        _ => base,
    };
    format!("{stem}_{sanitized}{extension}")
}

/// Where an ingestion client sends its records: nowhere, one file, or
/// one file per symbol
pub enum Sink<F: LineFormat> {
    /// No output configured
    Disabled,
    /// Everything into one base path
    Single(SegmentedWriter<F>),
    /// One file per symbol
    PerSymbol(MultiFileWriter<F>),
}

impl<F: LineFormat> Default for Sink<F> {
    fn default() -> Self {
        Self::Disabled
    }
}

impl<F: LineFormat> Sink<F> {
    /// Append one record; `Ok(true)` when the call drained to disk
    pub fn write(&mut self, record: &F::Record) -> Result<bool, FeedError> {
        match self {
            Self::Disabled => Ok(false),
            Self::Single(writer) => writer.write(record),
            Self::PerSymbol(writer) => writer.write(record),
        }
    }

    /// Drain buffers
    pub fn flush(&mut self) -> Result<(), FeedError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Single(writer) => writer.flush(),
            Self::PerSymbol(writer) => writer.flush(),
        }
    }

    /// Forward the time trigger
    pub fn set_flush_interval(&mut self, secs: u64) {
        match self {
            Self::Disabled => {}
            Self::Single(writer) => writer.set_flush_interval(secs),
            Self::PerSymbol(writer) => writer.set_flush_interval(secs),
        }
    }

    /// Forward the memory trigger
    pub fn set_memory_threshold(&mut self, bytes: usize) {
        match self {
            Self::Disabled => {}
            Self::Single(writer) => writer.set_memory_threshold(bytes),
            Self::PerSymbol(writer) => writer.set_memory_threshold(bytes),
        }
    }

    /// Forward the segmentation mode
    pub fn set_segment_mode(&mut self, mode: SegmentMode) -> Result<(), FeedError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Single(writer) => writer.set_segment_mode(mode),
            Self::PerSymbol(writer) => writer.set_segment_mode(mode),
        }
    }

    /// Records written to disk so far
    #[must_use]
    pub fn records_written(&self) -> u64 {
        match self {
            Self::Disabled => 0,
            Self::Single(writer) => writer.records_written(),
            Self::PerSymbol(writer) => writer.records_written(),
        }
    }

    /// Whether the sink is dropping records after an I/O failure
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        match self {
            Self::Disabled => false,
            Self::Single(writer) => writer.is_degraded(),
            Self::PerSymbol(writer) => writer.is_degraded(),
        }
    }
}
