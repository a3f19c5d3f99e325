//! Session counters shared across worker tasks.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Live counters, updated from any worker.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    files_processed: AtomicUsize,
    records_found: AtomicUsize,
    changelogs_written: AtomicUsize,
    duplicates_skipped: AtomicUsize,
    mode_skipped: AtomicUsize,
    unpaired_dropped: AtomicUsize,
    errors: AtomicUsize,
}

fn bump(counter: &AtomicUsize, n: usize) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl StatsRecorder {
    pub fn record_file(&self) {
        bump(&self.files_processed, 1);
    }

    pub fn record_found(&self) {
        bump(&self.records_found, 1);
    }

    pub fn record_written(&self) {
        bump(&self.changelogs_written, 1);
    }

    pub fn record_duplicate(&self) {
        bump(&self.duplicates_skipped, 1);
    }

    pub fn record_mode_skipped(&self) {
        bump(&self.mode_skipped, 1);
    }

    pub fn record_dropped(&self, n: usize) {
        bump(&self.unpaired_dropped, n);
    }

    pub fn record_error(&self) {
        bump(&self.errors, 1);
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            records_found: self.records_found.load(Ordering::Relaxed),
            changelogs_written: self.changelogs_written.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            mode_skipped: self.mode_skipped.load(Ordering::Relaxed),
            unpaired_dropped: self.unpaired_dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub files_processed: usize,
    pub records_found: usize,
    pub changelogs_written: usize,
    pub duplicates_skipped: usize,
    pub mode_skipped: usize,
    pub unpaired_dropped: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = StatsRecorder::default();
        stats.record_file();
        stats.record_found();
        stats.record_found();
        stats.record_written();
        stats.record_duplicate();
        stats.record_dropped(3);
        stats.record_error();

        assert_eq!(
            stats.snapshot(),
            ProcessorStats {
                files_processed: 1,
                records_found: 2,
                changelogs_written: 1,
                duplicates_skipped: 1,
                mode_skipped: 0,
                unpaired_dropped: 3,
                errors: 1,
            }
        );
    }

    #[test]
    fn test_counters_shared_across_threads() {
        let stats = std::sync::Arc::new(StatsRecorder::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = std::sync::Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_found();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().records_found, 400);
    }
}
