//! In-memory cursor state for watched files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read position for one watched file.
///
/// `confirmed_offset` is how far the file has been fully processed.
/// `pending_offset`, when set, marks the start of a pattern that was seen
/// but not yet completed and overrides the confirmed offset as the next
/// read start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCursor {
    path: PathBuf,
    confirmed_offset: u64,
    pending_offset: Option<u64>,
}

impl FileCursor {
    /// Create a cursor whose baseline is `offset`.
    #[must_use]
    pub fn new(path: PathBuf, offset: u64) -> Self {
        Self {
            path,
            confirmed_offset: offset,
            pending_offset: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn confirmed_offset(&self) -> u64 {
        self.confirmed_offset
    }

    #[must_use]
    pub fn pending_offset(&self) -> Option<u64> {
        self.pending_offset
    }

    /// Offset the next read must start from.
    #[must_use]
    pub fn next_read_start(&self) -> u64 {
        self.pending_offset.unwrap_or(self.confirmed_offset)
    }

    /// Confirm everything up to `offset` and drop any pending override.
    pub fn commit(&mut self, offset: u64) {
        tracing::trace!(
            path = %self.path.display(),
            from = self.confirmed_offset,
            to = offset,
            "Committing cursor"
        );
        self.confirmed_offset = offset;
        self.pending_offset = None;
    }

    /// Force the next read to restart at `offset` without confirming anything.
    ///
    /// A later call overwrites the previous override.
    pub fn mark_pending(&mut self, offset: u64) {
        debug_assert!(
            offset >= self.confirmed_offset,
            "pending offset {offset} behind confirmed offset {}",
            self.confirmed_offset
        );
        self.pending_offset = Some(offset);
    }

    /// Drop the pending override, keeping the confirmed offset.
    pub fn clear_pending(&mut self) {
        self.pending_offset = None;
    }
}

/// Cursors for every watched path.
///
/// Pure state: sizes are supplied by the caller, nothing here touches disk.
#[derive(Debug, Default)]
pub struct PositionStore {
    cursors: HashMap<PathBuf, FileCursor>,
}

impl PositionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cursor for `path`, creating one baselined at `current_size`.
    ///
    /// Content already in the file when it is first observed is never
    /// scheduled for processing.
    pub fn observe(&mut self, path: &Path, current_size: u64) -> &mut FileCursor {
        self.cursors.entry(path.to_path_buf()).or_insert_with(|| {
            tracing::debug!(
                path = %path.display(),
                baseline = current_size,
                "Tracking new file"
            );
            FileCursor::new(path.to_path_buf(), current_size)
        })
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&FileCursor> {
        self.cursors.get(path)
    }

    /// Store an updated cursor back under its path.
    pub fn update(&mut self, cursor: FileCursor) {
        self.cursors.insert(cursor.path.clone(), cursor);
    }

    /// Stop tracking `path`.
    pub fn forget(&mut self, path: &Path) -> Option<FileCursor> {
        self.cursors.remove(path)
    }

    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.cursors.contains_key(path)
    }
}
