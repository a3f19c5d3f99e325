//! Processed-identifier ledger backed by a rotating chain of log files.
//!
//! Layout inside the ledger directory:
//!
//! ```text
//! processed_ids.log      active, appended to
//! processed_ids.log.1    most recently rotated
//! processed_ids.log.N    oldest kept
//! ```
//!
//! Each line is `<identifier>|<rfc3339 timestamp>`. Lines holding only an
//! identifier are accepted on load.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use super::error::LedgerError;

/// File name of the active ledger file.
pub const LEDGER_FILE_NAME: &str = "processed_ids.log";

/// Set of emitted identifiers, persisted across restarts.
#[derive(Debug)]
pub struct Ledger {
    dir: PathBuf,
    max_file_size: u64,
    rotation_count: u32,
    processed: HashSet<String>,
}

impl Ledger {
    /// Open the ledger in `dir`, loading identifiers from the active file and
    /// every rotated file in the chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// ledger file cannot be read.
    pub fn open(
        dir: impl AsRef<Path>,
        max_file_size: u64,
        rotation_count: u32,
    ) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| LedgerError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let mut ledger = Self {
            dir,
            max_file_size,
            rotation_count,
            processed: HashSet::new(),
        };
        for path in ledger.chain() {
            ledger.load_file(&path)?;
        }
        tracing::info!(
            dir = %ledger.dir.display(),
            count = ledger.processed.len(),
            "Loaded previously processed IDs"
        );
        Ok(ledger)
    }

    /// Path of the active ledger file.
    #[must_use]
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE_NAME)
    }

    /// Path of rotation slot `n` (1-based).
    #[must_use]
    pub fn rotated_path(&self, n: u32) -> PathBuf {
        self.dir.join(format!("{LEDGER_FILE_NAME}.{n}"))
    }

    /// Active file followed by every rotation slot.
    fn chain(&self) -> Vec<PathBuf> {
        std::iter::once(self.active_path())
            .chain((1..=self.rotation_count).map(|n| self.rotated_path(n)))
            .collect()
    }

    fn load_file(&mut self, path: &Path) -> Result<(), LedgerError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let id = line.split('|').next().unwrap_or_default().trim();
            if !id.is_empty() {
                self.processed.insert(id.to_string());
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Record `id` as processed.
    ///
    /// Returns `Ok(false)` without touching disk if `id` was already
    /// recorded. The identifier only enters the in-memory set once its line
    /// has been written.
    ///
    /// # Errors
    ///
    /// Returns an error if rotation or the append fails; `id` is then not
    /// considered processed.
    pub fn mark_processed(&mut self, id: &str) -> Result<bool, LedgerError> {
        if self.processed.contains(id) {
            return Ok(false);
        }

        let entry = format!(
            "{id}|{}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        self.rotate_if_needed(entry.len() as u64)?;

        let path = self.active_path();
        let append = |path: &Path| -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(entry.as_bytes())?;
            file.sync_data()
        };
        append(&path).map_err(|source| LedgerError::Append { path, source })?;

        self.processed.insert(id.to_string());
        Ok(true)
    }

    /// Rotate the chain if appending `incoming` bytes would push a non-empty
    /// active file over the size threshold.
    ///
    /// Returns whether a rotation happened.
    ///
    /// # Errors
    ///
    /// Returns an error if any rotation step fails. Steps already applied
    /// leave every surviving file intact.
    pub fn rotate_if_needed(&mut self, incoming: u64) -> Result<bool, LedgerError> {
        let active = self.active_path();
        let size = match fs::metadata(&active) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == ErrorKind::NotFound => 0,
            Err(source) => {
                return Err(LedgerError::Rotate {
                    path: active,
                    source,
                })
            }
        };

        if size == 0 || size.saturating_add(incoming) <= self.max_file_size {
            return Ok(false);
        }

        tracing::info!(path = %active.display(), size, "Rotating ledger");
        self.rotate()?;
        Ok(true)
    }

    /// Shift the chain one slot, leaf to root: drop the oldest, move each
    /// rotated file down, move the active file to slot 1, then start a fresh
    /// active file.
    fn rotate(&self) -> Result<(), LedgerError> {
        let rotate_err = |path: &Path, source| LedgerError::Rotate {
            path: path.to_path_buf(),
            source,
        };

        let oldest = self.rotated_path(self.rotation_count);
        match fs::remove_file(&oldest) {
            Ok(()) => tracing::debug!(path = %oldest.display(), "Deleted oldest ledger file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(rotate_err(&oldest, e)),
        }

        for n in (1..self.rotation_count).rev() {
            let from = self.rotated_path(n);
            if from.exists() {
                fs::rename(&from, self.rotated_path(n + 1)).map_err(|e| rotate_err(&from, e))?;
            }
        }

        let active = self.active_path();
        fs::rename(&active, self.rotated_path(1)).map_err(|e| rotate_err(&active, e))?;
        File::create(&active).map_err(|e| rotate_err(&active, e))?;
        Ok(())
    }

    /// Number of identifiers known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(n: u32) -> String {
        format!("00000000-0000-4000-8000-{n:012}")
    }

    fn ids_in(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split('|').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_mark_and_query() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::open(dir.path(), 1024, 3).unwrap();

        assert!(!ledger.is_processed(&id(1)));
        assert!(ledger.mark_processed(&id(1)).unwrap());
        assert!(ledger.is_processed(&id(1)));
        // Second mark is a no-op.
        assert!(!ledger.mark_processed(&id(1)).unwrap());
        assert_eq!(ids_in(&ledger.active_path()), vec![id(1)]);
    }

    #[test]
    fn test_reload_after_restart() {
        let dir = TempDir::new().unwrap();
        {
            let mut ledger = Ledger::open(dir.path(), 1024, 3).unwrap();
            ledger.mark_processed(&id(1)).unwrap();
            ledger.mark_processed(&id(2)).unwrap();
        }
        let ledger = Ledger::open(dir.path(), 1024, 3).unwrap();
        assert!(ledger.is_processed(&id(1)));
        assert!(ledger.is_processed(&id(2)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_loads_legacy_lines_without_timestamp() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(LEDGER_FILE_NAME),
            format!("{}\n\n{}|2026-01-07T11:15:30.123Z\n", id(7), id(8)),
        )
        .unwrap();

        let ledger = Ledger::open(dir.path(), 1024, 3).unwrap();
        assert!(ledger.is_processed(&id(7)));
        assert!(ledger.is_processed(&id(8)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_rotation_happens_before_crossing_threshold() {
        let dir = TempDir::new().unwrap();
        // Each entry is 62 bytes, so two fit under 150.
        let mut ledger = Ledger::open(dir.path(), 150, 3).unwrap();

        ledger.mark_processed(&id(1)).unwrap();
        ledger.mark_processed(&id(2)).unwrap();
        assert!(!ledger.rotated_path(1).exists());

        ledger.mark_processed(&id(3)).unwrap();
        assert_eq!(ids_in(&ledger.rotated_path(1)), vec![id(1), id(2)]);
        assert_eq!(ids_in(&ledger.active_path()), vec![id(3)]);
        assert!(fs::metadata(ledger.active_path()).unwrap().len() <= 150);
    }

    #[test]
    fn test_oldest_file_dropped_beyond_rotation_count() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::open(dir.path(), 150, 2).unwrap();
        for n in 1..=7 {
            ledger.mark_processed(&id(n)).unwrap();
        }

        assert_eq!(ids_in(&ledger.rotated_path(2)), vec![id(3), id(4)]);
        assert_eq!(ids_in(&ledger.rotated_path(1)), vec![id(5), id(6)]);
        assert_eq!(ids_in(&ledger.active_path()), vec![id(7)]);
        assert!(!ledger.rotated_path(3).exists());

        // The running process still remembers everything it emitted.
        assert!(ledger.is_processed(&id(1)));

        let reloaded = Ledger::open(dir.path(), 150, 2).unwrap();
        assert!(!reloaded.is_processed(&id(1)));
        assert!(!reloaded.is_processed(&id(2)));
        for n in 3..=7 {
            assert!(reloaded.is_processed(&id(n)));
        }
    }

    #[test]
    fn test_rotate_if_needed_on_empty_active_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::open(dir.path(), 10, 3).unwrap();
        assert!(!ledger.rotate_if_needed(100).unwrap());
        assert!(!ledger.rotated_path(1).exists());
    }
}
