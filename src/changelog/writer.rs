//! Markdown changelog files, one per subtask.

use std::fs;
use std::path::{Path, PathBuf};

use super::error::WriterError;
use super::RecordSink;
use crate::extract::FinalRecord;

/// File name for `record`: `changelog_<timestamp>_UTC_<id>.md`.
///
/// The timestamp uses dashes instead of colons so the name is valid on
/// every platform.
#[must_use]
pub fn changelog_file_name(record: &FinalRecord) -> String {
    format!(
        "changelog_{}_UTC_{}.md",
        record.timestamp.format("%Y-%m-%dT%H-%M-%S-%3f"),
        record.id
    )
}

/// Markdown body for `record`.
#[must_use]
pub fn render_markdown(record: &FinalRecord) -> String {
    format!(
        "# Part of Changelog\n\
         \n\
         ## Task ID: {id}\n\
         \n\
         **Mode:** {mode}\n\
         **Completed:** {completed} UTC\n\
         \n\
         ---\n\
         \n\
         ## Instruction\n\
         \n\
         {instruction}\n\
         \n\
         ---\n\
         \n\
         ## Result\n\
         \n\
         {result}\n",
        id = record.id,
        mode = record.mode,
        completed = record.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f"),
        instruction = record.instruction,
        result = record.result,
    )
}

/// Writes each record to its own markdown file in an output directory.
#[derive(Debug, Clone)]
pub struct ChangelogWriter {
    output_dir: PathBuf,
}

impl ChangelogWriter {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `record` and return the path of the new file.
    ///
    /// Writes to a temporary file first, then renames to avoid leaving a
    /// half-written changelog behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, record: &FinalRecord) -> Result<PathBuf, WriterError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| WriterError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self.output_dir.join(changelog_file_name(record));
        let temp_path = path.with_extension("md.tmp");

        if let Err(source) = fs::write(&temp_path, render_markdown(record)) {
            let _ = fs::remove_file(&temp_path);
            return Err(WriterError::Write {
                path: temp_path,
                source,
            });
        }
        if let Err(source) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(WriterError::Write { path, source });
        }

        tracing::info!(path = %path.display(), subtask_id = %record.id, "Created changelog");
        Ok(path)
    }

    /// Number of changelog files already in the output directory.
    #[must_use]
    pub fn changelog_count(&self) -> usize {
        fs::read_dir(&self.output_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
                    .count()
            })
            .unwrap_or(0)
    }
}

impl RecordSink for ChangelogWriter {
    fn emit(&self, record: &FinalRecord) -> Result<(), WriterError> {
        self.write(record).map(|_| ())
    }
}
