//! Per-file pipeline: read, extract, claim, format, emit, commit.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::stats::{ProcessorStats, StatsRecorder};
use crate::changelog::RecordSink;
use crate::config::RoovisionConfig;
use crate::extract::{Extractor, Mode, RawRecord};
use crate::format::Formatter;
use crate::ledger::{Ledger, LedgerError};
use crate::tracker::{FileCursor, PositionStore, Reader, TrackerError};

/// What one `process_file` call did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Complete pairs extracted.
    pub found: usize,
    /// Records handed to the sink successfully.
    pub emitted: usize,
    /// Records whose identifier was already in the ledger.
    pub duplicates: usize,
    /// Records claimed but not written because of their mode.
    pub mode_skipped: usize,
    /// Results dropped for lack of an instruction.
    pub dropped: usize,
    /// Offset the next scan restarts from, if something was left unfinished.
    pub pending: Option<u64>,
}

/// Turns appended conversation bytes into changelog records.
///
/// Methods are synchronous and take `&self`; callers must not run two
/// `process_file` calls for the same path at once.
pub struct ChangelogProcessor {
    reader: Reader,
    extractor: Extractor,
    formatter: Formatter,
    ledger: Mutex<Ledger>,
    positions: Mutex<PositionStore>,
    sink: Arc<dyn RecordSink>,
    skip_modes: Vec<Mode>,
    stats: StatsRecorder,
}

impl ChangelogProcessor {
    #[must_use]
    pub fn new(config: &RoovisionConfig, ledger: Ledger, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            reader: Reader::new(
                config.max_read_bytes,
                config.lookahead_bytes,
                config.lookbehind_bytes,
            ),
            extractor: Extractor::new(),
            formatter: Formatter::new(),
            ledger: Mutex::new(ledger),
            positions: Mutex::new(PositionStore::new()),
            sink,
            skip_modes: config.skip_modes.clone(),
            stats: StatsRecorder::default(),
        }
    }

    fn positions(&self) -> MutexGuard<'_, PositionStore> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `path` at its current size without processing anything.
    ///
    /// Returns the baseline offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed.
    pub fn initialize_file(&self, path: &Path) -> Result<u64, TrackerError> {
        let size = Reader::file_size(path)?;
        Ok(self.positions().observe(path, size).next_read_start())
    }

    /// Stop tracking `path`.
    pub fn forget(&self, path: &Path) {
        if self.positions().forget(path).is_some() {
            tracing::debug!(path = %path.display(), "Stopped tracking file");
        }
    }

    /// Whether `path` has a cursor.
    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.positions().is_tracked(path)
    }

    /// Cursor for `path`, if tracked.
    #[must_use]
    pub fn cursor(&self, path: &Path) -> Option<FileCursor> {
        self.positions().get(path).cloned()
    }

    /// Process whatever was appended to `path` since the last call.
    ///
    /// A file seen for the first time is only baselined. Otherwise new bytes
    /// are read in capped chunks until the file is caught up or a pattern is
    /// left pending.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read. The cursor keeps whatever
    /// was committed before the failure.
    pub fn process_file(&self, path: &Path) -> Result<ScanReport, TrackerError> {
        let Some(mut cursor) = self.cursor(path) else {
            let baseline = self.initialize_file(path)?;
            tracing::debug!(path = %path.display(), baseline, "First sight of file, baselined");
            return Ok(ScanReport::default());
        };

        self.stats.record_file();
        let mut report = ScanReport::default();
        let result = self.drain(&mut cursor, &mut report);
        self.positions().update(cursor);

        if report.found > 0 || report.dropped > 0 {
            tracing::info!(
                path = %path.display(),
                found = report.found,
                emitted = report.emitted,
                duplicates = report.duplicates,
                dropped = report.dropped,
                "Processed file"
            );
        }
        result.map(|()| report)
    }

    fn drain(&self, cursor: &mut FileCursor, report: &mut ScanReport) -> Result<(), TrackerError> {
        loop {
            let chunk = self.reader.read_new_bytes(cursor)?;
            if chunk.is_empty() {
                return Ok(());
            }
            tracing::debug!(
                path = %cursor.path().display(),
                start = chunk.start,
                len = chunk.bytes.len(),
                file_len = chunk.file_len,
                "Scanning new bytes"
            );

            let mut backfill = self.reader.backfill(cursor.path());
            let extraction = self
                .extractor
                .extract(&chunk.bytes, chunk.start, &mut backfill);
            report.dropped += extraction.dropped;
            self.stats.record_dropped(extraction.dropped);

            let mut resume = extraction.resume_offset;
            let mut stalled = false;
            for record in extraction.records {
                let result_start = record.result_start;
                if let Err(e) = self.handle_record(record, report) {
                    tracing::error!(
                        path = %cursor.path().display(),
                        offset = result_start,
                        error = %e,
                        "Failed to record processed ID, will retry"
                    );
                    self.stats.record_error();
                    resume = Some(result_start);
                    stalled = true;
                    break;
                }
            }

            match resume {
                Some(offset) => {
                    cursor.mark_pending(offset);
                    report.pending = Some(offset);
                }
                None => {
                    cursor.commit(extraction.scanned_to);
                    report.pending = None;
                }
            }

            if stalled || !chunk.has_more() || cursor.next_read_start() <= chunk.start {
                return Ok(());
            }
        }
    }

    /// Claim one record in the ledger, then write it unless its mode is
    /// skipped. Only a ledger failure is returned; the record is then
    /// unclaimed and retried on the next scan.
    fn handle_record(&self, raw: RawRecord, report: &mut ScanReport) -> Result<(), LedgerError> {
        report.found += 1;
        self.stats.record_found();

        if !self.ledger().mark_processed(&raw.id)? {
            tracing::debug!(subtask_id = %raw.id, "Skipping duplicate");
            report.duplicates += 1;
            self.stats.record_duplicate();
            return Ok(());
        }

        if self.skip_modes.contains(&raw.mode) {
            tracing::info!(subtask_id = %raw.id, mode = %raw.mode, "Skipping subtask by mode");
            report.mode_skipped += 1;
            self.stats.record_mode_skipped();
            return Ok(());
        }

        let record = self.formatter.format(&raw, Utc::now());
        match self.sink.emit(&record) {
            Ok(()) => {
                report.emitted += 1;
                self.stats.record_written();
            }
            Err(e) => {
                tracing::error!(subtask_id = %record.id, error = %e, "Failed to write changelog");
                self.stats.record_error();
            }
        }
        Ok(())
    }

    /// Count a failure that happened outside the pipeline.
    pub fn record_error(&self) {
        self.stats.record_error();
    }

    #[must_use]
    pub fn stats(&self) -> ProcessorStats {
        self.stats.snapshot()
    }

    /// Identifiers currently in the ledger.
    #[must_use]
    pub fn processed_count(&self) -> usize {
        self.ledger().len()
    }
}
