//! Conversation file discovery.
//!
//! Roo Code keeps one folder per task under its tasks directory, each with
//! its own conversation history file.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::WatcherError;

/// Files found under a tasks directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Conversation files recent enough to track.
    pub files: Vec<PathBuf>,
    /// Conversation files skipped by the age filter.
    pub skipped_old: usize,
}

/// Whether `path` names a conversation file.
#[must_use]
pub fn is_conversation_file(path: &Path, filename: &str) -> bool {
    path.file_name().is_some_and(|name| name == filename)
}

/// Recursively find every `filename` under `root`.
///
/// With `max_age`, files last modified longer ago than that are counted in
/// `skipped_old` instead of returned. Unreadable subdirectories are logged
/// and skipped.
///
/// # Errors
///
/// Returns an error if `root` does not exist or cannot be read.
pub fn discover_conversation_files(
    root: &Path,
    filename: &str,
    max_age: Option<Duration>,
) -> Result<Discovery, WatcherError> {
    if !root.is_dir() {
        return Err(WatcherError::MissingRoot(root.to_path_buf()));
    }

    let cutoff = max_age.and_then(|age| SystemTime::now().checked_sub(age));
    let mut discovery = Discovery::default();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && is_conversation_file(&path, filename) {
                let too_old = cutoff.is_some_and(|cutoff| {
                    entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .is_ok_and(|modified| modified < cutoff)
                });
                if too_old {
                    discovery.skipped_old += 1;
                } else {
                    discovery.files.push(path);
                }
            }
        }
    }

    discovery.files.sort();
    Ok(discovery)
}
