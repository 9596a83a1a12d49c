//! Flush and segmentation policy.
//!
//! A [`FlushPolicy`] decides *when* buffered records reach disk and *which
//! file* they reach. It drives any writer through the [`FlushTarget`]
//! capability trait: after every appended record the writer calls
//! [`FlushPolicy::check_and_flush`], which first handles a wall-clock
//! segment rollover (drain, then switch files) and then evaluates the
//! OR-ed time/memory triggers.

use chrono::{DateTime, Utc};
use std::io;
use std::time::{Duration, Instant};
use tracing::info;

/// Default time trigger: 30 seconds
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 30;

/// Default memory trigger: 10 MiB of buffered records
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: usize = 10 * 1024 * 1024;

/// Wall-clock file segmentation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    /// Single file
    #[default]
    None,
    /// One file per UTC hour (`YYYYMMDD_HH`)
    Hourly,
    /// One file per UTC day (`YYYYMMDD`)
    Daily,
}

impl SegmentMode {
    /// Segment key for `now` under this mode; empty for [`SegmentMode::None`]
    #[must_use]
    pub fn key(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::None => String::new(),
            Self::Hourly => now.format("%Y%m%d_%H").to_string(),
            Self::Daily => now.format("%Y%m%d").to_string(),
        }
    }
}

/// Capabilities a writer lends to the policy
pub trait FlushTarget {
    /// Records currently buffered in memory
    fn buffered_records(&self) -> usize;
    /// Approximate bytes per buffered record (drives the memory trigger)
    fn record_size_hint(&self) -> usize;
    /// File extension including the dot, e.g. `".jsonl"`
    fn file_extension(&self) -> &'static str;
    /// Drain the buffer to the current file and flush it
    fn perform_flush(&mut self) -> io::Result<()>;
    /// Close the current file and open `new_path` as the next segment
    fn perform_segment_transition(&mut self, new_path: &str) -> io::Result<()>;
}

/// What a `check_and_flush` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// The buffer was drained to disk
    pub flushed: bool,
    /// A new segment file was opened
    pub rotated: bool,
}

/// Why a policy-driven operation failed; rotation failures degrade the
/// writer just like flush failures but are reported distinctly
#[derive(Debug)]
pub enum PolicyError {
    /// Draining the buffer failed
    Flush(io::Error),
    /// Closing/opening segment files failed
    Rotation(io::Error),
}

/// Flush/segmentation decision state for one writer
#[derive(Debug)]
pub struct FlushPolicy {
    flush_interval: Duration,
    memory_threshold: usize,
    mode: SegmentMode,
    base_path: String,
    last_flush: Instant,
    flush_count: u64,
    segment_count: u64,
    current_key: String,
    current_path: String,
}

impl FlushPolicy {
    /// Policy for a writer rooted at `base_path`, with default triggers
    /// and no segmentation
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        Self {
            flush_interval: Duration::from_secs(DEFAULT_FLUSH_INTERVAL_SECS),
            memory_threshold: DEFAULT_MEMORY_THRESHOLD_BYTES,
            mode: SegmentMode::None,
            current_path: base_path.clone(),
            base_path,
            last_flush: Instant::now(),
            flush_count: 0,
            segment_count: 0,
            current_key: String::new(),
        }
    }

    /// Set the time trigger; 0 disables it
    pub fn set_flush_interval(&mut self, secs: u64) {
        self.flush_interval = Duration::from_secs(secs);
    }

    /// Set the memory trigger; 0 disables it
    pub fn set_memory_threshold(&mut self, bytes: usize) {
        self.memory_threshold = bytes;
    }

    /// File the writer should currently append to
    #[must_use]
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Completed drains so far
    #[must_use]
    pub const fn flush_count(&self) -> u64 {
        self.flush_count
    }

    /// Segment files opened so far (0 while unsegmented)
    #[must_use]
    pub const fn segment_count(&self) -> u64 {
        self.segment_count
    }

    /// Enable segmentation and open the first segment immediately
    pub fn set_segment_mode<T: FlushTarget>(
        &mut self,
        mode: SegmentMode,
        target: &mut T,
    ) -> Result<(), PolicyError> {
        self.set_segment_mode_at(mode, target, Utc::now())
    }

    /// Clock-injected variant of [`Self::set_segment_mode`]
    pub fn set_segment_mode_at<T: FlushTarget>(
        &mut self,
        mode: SegmentMode,
        target: &mut T,
        now: DateTime<Utc>,
    ) -> Result<(), PolicyError> {
        self.mode = mode;
        if mode == SegmentMode::None {
            self.current_key.clear();
            self.current_path = self.base_path.clone();
            return Ok(());
        }

        self.current_key = mode.key(now);
        self.current_path =
            insert_segment_key(&self.base_path, &self.current_key, target.file_extension());
        target
            .perform_segment_transition(&self.current_path)
            .map_err(PolicyError::Rotation)?;
        self.segment_count = 1;
        info!(path = %self.current_path, "starting new segment");
        Ok(())
    }

    /// Evaluate rotation and flush triggers after a record append
    pub fn check_and_flush<T: FlushTarget>(
        &mut self,
        target: &mut T,
    ) -> Result<FlushOutcome, PolicyError> {
        self.check_and_flush_at(target, Utc::now())
    }

    /// Clock-injected variant of [`Self::check_and_flush`].
    ///
    /// Rotation first: when the wall-clock key changes, the buffer is
    /// drained into the finishing segment before the new file opens, so
    /// no record lands in the wrong segment and none is lost across the
    /// cut.
    pub fn check_and_flush_at<T: FlushTarget>(
        &mut self,
        target: &mut T,
        now: DateTime<Utc>,
    ) -> Result<FlushOutcome, PolicyError> {
        let mut outcome = FlushOutcome::default();

        if self.mode != SegmentMode::None {
            let key = self.mode.key(now);
            if key != self.current_key {
                if target.buffered_records() > 0 {
                    target.perform_flush().map_err(PolicyError::Flush)?;
                    self.flush_count += 1;
                    self.last_flush = Instant::now();
                    outcome.flushed = true;
                }
                self.current_key = key;
                self.current_path = insert_segment_key(
                    &self.base_path,
                    &self.current_key,
                    target.file_extension(),
                );
                target
                    .perform_segment_transition(&self.current_path)
                    .map_err(PolicyError::Rotation)?;
                self.segment_count += 1;
                outcome.rotated = true;
                info!(path = %self.current_path, "starting new segment");
            }
        }

        let buffered = target.buffered_records();
        if buffered > 0 {
            let time_due = !self.flush_interval.is_zero()
                && self.last_flush.elapsed() >= self.flush_interval;
            let memory_due = self.memory_threshold > 0
                && buffered * target.record_size_hint() >= self.memory_threshold;
            if time_due || memory_due {
                target.perform_flush().map_err(PolicyError::Flush)?;
                self.flush_count += 1;
                self.last_flush = Instant::now();
                outcome.flushed = true;
            }
        }

        Ok(outcome)
    }

    /// Drain unconditionally (shutdown, external request)
    pub fn force_flush<T: FlushTarget>(&mut self, target: &mut T) -> Result<(), PolicyError> {
        if target.buffered_records() > 0 {
            target.perform_flush().map_err(PolicyError::Flush)?;
            self.flush_count += 1;
            self.last_flush = Instant::now();
        }
        Ok(())
    }
}

/// `"x.ext"` + key `"K"` -> `"x.K.ext"`; bases without the recognized
/// extension get `.K` appended.
#[must_use]
pub fn insert_segment_key(base: &str, key: &str, extension: &str) -> String {
    match base.rfind(extension) {
        Some(pos) if pos + extension.len() == base.len() => {
            format!("{}.{}{}", &base[..pos], key, extension)
        }
        _ => format!("{base}.{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Target that counts operations instead of touching the filesystem
    #[derive(Default)]
    struct StubTarget {
        buffered: usize,
        record_size: usize,
        flushes: Vec<usize>,
        transitions: Vec<String>,
        fail_flush: bool,
    }

    impl FlushTarget for StubTarget {
        fn buffered_records(&self) -> usize {
            self.buffered
        }
        fn record_size_hint(&self) -> usize {
            self.record_size
        }
        fn file_extension(&self) -> &'static str {
            ".csv"
        }
        fn perform_flush(&mut self) -> io::Result<()> {
            if self.fail_flush {
                return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
            }
            self.flushes.push(self.buffered);
            self.buffered = 0;
            Ok(())
        }
        fn perform_segment_transition(&mut self, new_path: &str) -> io::Result<()> {
            self.transitions.push(new_path.to_string());
            Ok(())
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn segment_keys() {
        let t = at(2025, 4, 17, 14, 59, 58);
        assert_eq!(SegmentMode::Hourly.key(t), "20250417_14");
        assert_eq!(SegmentMode::Daily.key(t), "20250417");
        assert_eq!(SegmentMode::None.key(t), "");
    }

    #[test]
    fn filename_insertion() {
        assert_eq!(
            insert_segment_key("out.csv", "20250417_14", ".csv"),
            "out.20250417_14.csv"
        );
        assert_eq!(
            insert_segment_key("dir/out.jsonl", "20250417", ".jsonl"),
            "dir/out.20250417.jsonl"
        );
        assert_eq!(insert_segment_key("out", "20250417", ".csv"), "out.20250417");
    }

    #[test]
    fn memory_trigger_fires() {
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(100);

        let mut target = StubTarget {
            buffered: 9,
            record_size: 10,
            ..StubTarget::default()
        };
        let outcome = policy.check_and_flush(&mut target).unwrap();
        assert!(!outcome.flushed);

        target.buffered = 10;
        let outcome = policy.check_and_flush(&mut target).unwrap();
        assert!(outcome.flushed);
        assert_eq!(target.flushes, vec![10]);
        assert_eq!(policy.flush_count(), 1);
    }

    #[test]
    fn disabled_triggers_never_fire() {
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(0);

        let mut target = StubTarget {
            buffered: 1_000_000,
            record_size: 1024,
            ..StubTarget::default()
        };
        let outcome = policy.check_and_flush(&mut target).unwrap();
        assert!(!outcome.flushed);
        assert!(target.flushes.is_empty());
    }

    #[test]
    fn empty_buffer_never_flushes() {
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(1);
        let mut target = StubTarget::default();
        assert!(!policy.check_and_flush(&mut target).unwrap().flushed);
    }

    #[test]
    fn hourly_rotation_drains_then_switches() {
        // spec scenario: records just before and just after an UTC hour
        // boundary land in two files, nothing lost, nothing duplicated.
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(0);

        let mut target = StubTarget {
            record_size: 1,
            ..StubTarget::default()
        };
        policy
            .set_segment_mode_at(SegmentMode::Hourly, &mut target, at(2025, 4, 17, 14, 59, 58))
            .unwrap();
        assert_eq!(target.transitions, vec!["out.20250417_14.csv"]);

        target.buffered = 3;
        let outcome = policy
            .check_and_flush_at(&mut target, at(2025, 4, 17, 14, 59, 59))
            .unwrap();
        assert!(!outcome.rotated);

        let outcome = policy
            .check_and_flush_at(&mut target, at(2025, 4, 17, 15, 0, 2))
            .unwrap();
        assert!(outcome.rotated);
        assert!(outcome.flushed);
        // the 3 buffered records drained into the 14h file before the cut
        assert_eq!(target.flushes, vec![3]);
        assert_eq!(
            target.transitions,
            vec!["out.20250417_14.csv", "out.20250417_15.csv"]
        );
        assert_eq!(policy.segment_count(), 2);
        assert_eq!(policy.current_path(), "out.20250417_15.csv");
    }

    #[test]
    fn daily_rotation_key_change_only_at_midnight() {
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(0);
        let mut target = StubTarget::default();
        policy
            .set_segment_mode_at(SegmentMode::Daily, &mut target, at(2025, 4, 17, 0, 0, 0))
            .unwrap();

        policy
            .check_and_flush_at(&mut target, at(2025, 4, 17, 23, 59, 59))
            .unwrap();
        assert_eq!(policy.segment_count(), 1);

        policy
            .check_and_flush_at(&mut target, at(2025, 4, 18, 0, 0, 0))
            .unwrap();
        assert_eq!(policy.segment_count(), 2);
        assert_eq!(policy.current_path(), "out.20250418.csv");
    }

    #[test]
    fn force_flush_drains_and_counts() {
        let mut policy = FlushPolicy::new("out.csv");
        let mut target = StubTarget {
            buffered: 5,
            record_size: 1,
            ..StubTarget::default()
        };
        policy.force_flush(&mut target).unwrap();
        assert_eq!(target.flushes, vec![5]);
        assert_eq!(policy.flush_count(), 1);
        // idempotent on empty buffer
        policy.force_flush(&mut target).unwrap();
        assert_eq!(policy.flush_count(), 1);
    }

    #[test]
    fn flush_failure_propagates() {
        let mut policy = FlushPolicy::new("out.csv");
        policy.set_flush_interval(0);
        policy.set_memory_threshold(1);
        let mut target = StubTarget {
            buffered: 5,
            record_size: 1,
            fail_flush: true,
            ..StubTarget::default()
        };
        assert!(matches!(
            policy.check_and_flush(&mut target),
            Err(PolicyError::Flush(_))
        ));
    }
}
