//! Bounded incremental reads of tracked files.
//!
//! All reads are synchronous and size-capped; callers on an async runtime
//! run them through `tokio::task::spawn_blocking`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::cursor::FileCursor;
use super::error::TrackerError;
use crate::extract::Backfill;

/// Bytes pulled from a file by one incremental read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Raw bytes read.
    pub bytes: Vec<u8>,
    /// Absolute offset of the first byte.
    pub start: u64,
    /// File length observed when the read was made.
    pub file_len: u64,
}

impl Chunk {
    /// Absolute offset one past the last byte read.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.bytes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the file holds more bytes than this chunk reached.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.end() < self.file_len
    }
}

/// Size-capped reader for tracked files.
#[derive(Debug, Clone, Copy)]
pub struct Reader {
    max_read_bytes: u64,
    lookahead_bytes: u64,
    lookbehind_bytes: u64,
}

impl Reader {
    #[must_use]
    pub fn new(max_read_bytes: u64, lookahead_bytes: u64, lookbehind_bytes: u64) -> Self {
        Self {
            max_read_bytes,
            lookahead_bytes,
            lookbehind_bytes,
        }
    }

    /// Current length of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed.
    pub fn file_size(path: &Path) -> Result<u64, TrackerError> {
        std::fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| TrackerError::from_io(path, e))
    }

    /// Read bytes appended since the cursor's next read start.
    ///
    /// A file at or below the read start (unchanged or truncated) yields an
    /// empty chunk; truncation never rewinds the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file vanished, is unreadable, or the read
    /// fails. The cursor is not touched either way.
    pub fn read_new_bytes(&self, cursor: &FileCursor) -> Result<Chunk, TrackerError> {
        let path = cursor.path();
        let start = cursor.next_read_start();
        let mut file = File::open(path).map_err(|e| TrackerError::from_io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| TrackerError::from_io(path, e))?
            .len();

        if file_len <= start {
            if file_len < start {
                tracing::debug!(
                    path = %path.display(),
                    read_start = start,
                    file_len,
                    "File shorter than cursor, treating as unchanged"
                );
            }
            return Ok(Chunk {
                bytes: Vec::new(),
                start,
                file_len,
            });
        }

        let len = (file_len - start).min(self.max_read_bytes);
        let bytes = read_range(&mut file, path, start, len)?;
        Ok(Chunk {
            bytes,
            start,
            file_len,
        })
    }

    /// Read up to the look-ahead cap starting at `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn read_ahead(&self, path: &Path, from: u64) -> Result<Vec<u8>, TrackerError> {
        let mut file = File::open(path).map_err(|e| TrackerError::from_io(path, e))?;
        read_range(&mut file, path, from, self.lookahead_bytes)
    }

    /// Read up to the look-behind cap ending just before `before`.
    ///
    /// Returns the absolute start of the window together with its bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn read_behind(&self, path: &Path, before: u64) -> Result<(u64, Vec<u8>), TrackerError> {
        let start = before.saturating_sub(self.lookbehind_bytes);
        let mut file = File::open(path).map_err(|e| TrackerError::from_io(path, e))?;
        let bytes = read_range(&mut file, path, start, before - start)?;
        Ok((start, bytes))
    }

    /// Backfill source reading extra windows from `path`.
    #[must_use]
    pub fn backfill<'a>(&'a self, path: &'a Path) -> FileBackfill<'a> {
        FileBackfill { reader: self, path }
    }
}

fn read_range(file: &mut File, path: &Path, start: u64, len: u64) -> Result<Vec<u8>, TrackerError> {
    file.seek(SeekFrom::Start(start))
        .map_err(|e| TrackerError::from_io(path, e))?;
    let mut bytes = Vec::with_capacity(usize::try_from(len).unwrap_or(0).min(1 << 20));
    file.take(len)
        .read_to_end(&mut bytes)
        .map_err(|e| TrackerError::from_io(path, e))?;
    Ok(bytes)
}

/// File-backed look-ahead and look-behind for the extractor.
///
/// Read failures are logged and reported as "nothing available", which
/// leaves the affected pattern pending until the next event.
#[derive(Debug, Clone, Copy)]
pub struct FileBackfill<'a> {
    reader: &'a Reader,
    path: &'a Path,
}

impl Backfill for FileBackfill<'_> {
    fn ahead(&mut self, from: u64) -> Option<Vec<u8>> {
        tracing::debug!(path = %self.path.display(), from, "Reading ahead for end marker");
        match self.reader.read_ahead(self.path, from) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Look-ahead read failed");
                None
            }
        }
    }

    fn behind(&mut self, before: u64) -> Option<(u64, Vec<u8>)> {
        tracing::debug!(path = %self.path.display(), before, "Reading behind for instruction");
        match self.reader.read_behind(self.path, before) {
            Ok(window) => Some(window),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Look-behind read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_only_new_bytes() {
        let mut file = file_with(b"0123456789");
        let reader = Reader::new(1024, 64, 64);
        let cursor = FileCursor::new(file.path().to_path_buf(), 4);

        let chunk = reader.read_new_bytes(&cursor).unwrap();
        assert_eq!(chunk.bytes, b"456789");
        assert_eq!(chunk.start, 4);
        assert_eq!(chunk.end(), 10);
        assert!(!chunk.has_more());

        file.write_all(b"abc").unwrap();
        file.flush().unwrap();
        let mut cursor = cursor;
        cursor.commit(chunk.end());
        let chunk = reader.read_new_bytes(&cursor).unwrap();
        assert_eq!(chunk.bytes, b"abc");
    }

    #[test]
    fn test_read_is_capped() {
        let file = file_with(b"0123456789");
        let reader = Reader::new(3, 64, 64);
        let cursor = FileCursor::new(file.path().to_path_buf(), 2);

        let chunk = reader.read_new_bytes(&cursor).unwrap();
        assert_eq!(chunk.bytes, b"234");
        assert!(chunk.has_more());
    }

    #[test]
    fn test_reads_from_pending_offset() {
        let file = file_with(b"0123456789");
        let reader = Reader::new(1024, 64, 64);
        let mut cursor = FileCursor::new(file.path().to_path_buf(), 2);
        cursor.mark_pending(7);

        let chunk = reader.read_new_bytes(&cursor).unwrap();
        assert_eq!(chunk.bytes, b"789");
        assert_eq!(chunk.start, 7);
    }

    #[test]
    fn test_truncated_file_reads_nothing() {
        let file = file_with(b"short");
        let reader = Reader::new(1024, 64, 64);
        let cursor = FileCursor::new(file.path().to_path_buf(), 100);

        let chunk = reader.read_new_bytes(&cursor).unwrap();
        assert!(chunk.is_empty());
        assert_eq!(chunk.start, 100);
        assert_eq!(cursor.confirmed_offset(), 100);
    }

    #[test]
    fn test_missing_file_is_vanished() {
        let reader = Reader::new(1024, 64, 64);
        let cursor = FileCursor::new(PathBuf::from("/tmp/nonexistent-roovision-12345.json"), 0);
        let result = reader.read_new_bytes(&cursor);
        assert!(matches!(result, Err(TrackerError::FileVanished(_))));
    }

    #[test]
    fn test_read_ahead_and_behind_respect_caps() {
        let file = file_with(b"abcdefghijklmnopqrstuvwxyz");
        let reader = Reader::new(4, 5, 6);

        assert_eq!(reader.read_ahead(file.path(), 10).unwrap(), b"klmno");
        assert_eq!(reader.read_behind(file.path(), 10).unwrap(), (4, b"efghij".to_vec()));
        assert_eq!(reader.read_behind(file.path(), 3).unwrap(), (0, b"abc".to_vec()));
    }

    #[test]
    fn test_backfill_reports_missing_file_as_none() {
        let reader = Reader::new(4, 5, 6);
        let path = PathBuf::from("/tmp/nonexistent-roovision-67890.json");
        let mut backfill = reader.backfill(&path);
        assert!(backfill.ahead(0).is_none());
        assert!(backfill.behind(10).is_none());
    }
}
