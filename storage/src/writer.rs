//! Buffered, policy-driven record writer.
//!
//! [`SegmentedWriter`] buffers records in memory and lets its
//! [`FlushPolicy`] decide when they reach disk and into which segment
//! file. On the first I/O failure the writer degrades: the error is
//! surfaced once, the buffer is dropped, and subsequent records are
//! discarded so ingestion never blocks on a sick disk.

use crate::format::LineFormat;
use crate::policy::{FlushOutcome, FlushPolicy, FlushTarget, PolicyError, SegmentMode};
use common::FeedError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::mem;
use tracing::error;

/// Buffer + file handle half of the writer; the [`FlushPolicy`] drives it
/// through [`FlushTarget`].
struct WriterCore<F: LineFormat> {
    current_path: String,
    file: Option<BufWriter<File>>,
    buffer: Vec<F::Record>,
    header_pending: bool,
    records_written: u64,
    _format: PhantomData<fn() -> F>,
}

impl<F: LineFormat> WriterCore<F> {
    fn new(path: &str) -> Self {
        Self {
            current_path: path.to_string(),
            file: None,
            buffer: Vec::new(),
            header_pending: true,
            records_written: 0,
            _format: PhantomData,
        }
    }

    fn open_current(&mut self) -> std::io::Result<&mut BufWriter<File>> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.current_path)?;
            self.file = Some(BufWriter::new(file));
        }
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "file handle missing after open",
            )),
        }
    }
}

impl<F: LineFormat> FlushTarget for WriterCore<F> {
    fn buffered_records(&self) -> usize {
        self.buffer.len()
    }

    fn record_size_hint(&self) -> usize {
        mem::size_of::<F::Record>()
    }

    fn file_extension(&self) -> &'static str {
        F::EXTENSION
    }

    fn perform_flush(&mut self) -> std::io::Result<()> {
        let drained = mem::take(&mut self.buffer);
        let header_due = self.header_pending && !drained.is_empty();
        let file = self.open_current()?;

        if header_due {
            if let Some(header) = F::header() {
                file.write_all(header.as_bytes())?;
                file.write_all(b"\n")?;
            }
        }

        let mut line = String::new();
        for record in &drained {
            line.clear();
            F::write_line(record, &mut line);
            line.push('\n');
            file.write_all(line.as_bytes())?;
        }
        file.flush()?;

        if header_due {
            self.header_pending = false;
        }
        self.records_written += drained.len() as u64;
        Ok(())
    }

    fn perform_segment_transition(&mut self, new_path: &str) -> std::io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.current_path = new_path.to_string();
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(new_path)?;
        self.header_pending = true;
        Ok(())
    }
}

/// A writer for one record type, one base path, one flush policy.
///
/// `write` returns `Ok(true)` when the call drained the buffer to disk —
/// the ingestion client uses that edge to clear its pending queue.
pub struct SegmentedWriter<F: LineFormat> {
    core: WriterCore<F>,
    policy: FlushPolicy,
    degraded: bool,
    dropped_records: u64,
}

impl<F: LineFormat> SegmentedWriter<F> {
    /// Writer rooted at `path` with default policy (30 s / 10 MiB, no
    /// segmentation). The file opens lazily on the first drain.
    #[must_use]
    pub fn create(path: &str) -> Self {
        Self {
            core: WriterCore::new(path),
            policy: FlushPolicy::new(path),
            degraded: false,
            dropped_records: 0,
        }
    }

    /// Time trigger in seconds; 0 disables
    pub fn set_flush_interval(&mut self, secs: u64) {
        self.policy.set_flush_interval(secs);
    }

    /// Memory trigger in bytes; 0 disables
    pub fn set_memory_threshold(&mut self, bytes: usize) {
        self.policy.set_memory_threshold(bytes);
    }

    /// Enable wall-clock segmentation; opens the first segment file
    pub fn set_segment_mode(&mut self, mode: SegmentMode) -> Result<(), FeedError> {
        self.policy
            .set_segment_mode(mode, &mut self.core)
            .map_err(|e| self.degrade(e))
    }

    /// Append one record and run the flush policy
    pub fn write(&mut self, record: &F::Record) -> Result<bool, FeedError> {
        if self.degraded {
            self.dropped_records += 1;
            return Ok(false);
        }
        self.core.buffer.push(record.clone());
        match self.policy.check_and_flush(&mut self.core) {
            Ok(FlushOutcome { flushed, .. }) => Ok(flushed),
            Err(e) => Err(self.degrade(e)),
        }
    }

    /// Drain the buffer unconditionally
    pub fn flush(&mut self) -> Result<(), FeedError> {
        if self.degraded {
            return Ok(());
        }
        self.policy
            .force_flush(&mut self.core)
            .map_err(|e| self.degrade(e))
    }

    /// Records that reached the file
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.core.records_written
    }

    /// Records discarded after degradation
    #[must_use]
    pub const fn dropped_records(&self) -> u64 {
        self.dropped_records
    }

    /// Whether an I/O failure put this writer into drop mode
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Completed drains
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.policy.flush_count()
    }

    /// Segment files opened (0 while unsegmented)
    #[must_use]
    pub fn segment_count(&self) -> u64 {
        self.policy.segment_count()
    }

    /// File currently being appended to
    #[must_use]
    pub fn current_path(&self) -> &str {
        self.policy.current_path()
    }

    fn degrade(&mut self, e: PolicyError) -> FeedError {
        self.degraded = true;
        self.dropped_records += self.core.buffer.len() as u64;
        self.core.buffer.clear();
        let err = match e {
            PolicyError::Flush(io) => FeedError::WriterIo(io),
            PolicyError::Rotation(io) => FeedError::SegmentRotation(io.to_string()),
        };
        error!(path = %self.policy.current_path(), error = %err, "writer degraded; dropping records");
        err
    }

    #[cfg(test)]
    fn write_at(
        &mut self,
        record: &F::Record,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, FeedError> {
        self.core.buffer.push(record.clone());
        match self.policy.check_and_flush_at(&mut self.core, now) {
            Ok(FlushOutcome { flushed, .. }) => Ok(flushed),
            Err(e) => Err(self.degrade(e)),
        }
    }

    #[cfg(test)]
    fn set_segment_mode_at(
        &mut self,
        mode: SegmentMode,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), FeedError> {
        self.policy
            .set_segment_mode_at(mode, &mut self.core, now)
            .map_err(|e| self.degrade(e))
    }
}

/// Write a full ticker history to `path` in one shot (header + rows).
/// Used by `save_snapshot` on the ticker client.
pub fn write_history_csv(
    path: &str,
    records: &[common::types::TickerRecord],
) -> Result<(), FeedError> {
    use crate::format::TickerCsv;

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    if let Some(header) = TickerCsv::header() {
        out.write_all(header.as_bytes())?;
        out.write_all(b"\n")?;
    }
    let mut line = String::new();
    for record in records {
        line.clear();
        TickerCsv::write_line(record, &mut line);
        line.push('\n');
        out.write_all(line.as_bytes())?;
    }
    out.flush()?;
    Ok(())
}
