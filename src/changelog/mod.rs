//! Output side: where finished records go.

mod error;
mod writer;

pub use error::WriterError;
pub use writer::{changelog_file_name, render_markdown, ChangelogWriter};

use crate::extract::FinalRecord;

/// Destination for finished records.
pub trait RecordSink: Send + Sync {
    /// Hand one record over.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be persisted.
    fn emit(&self, record: &FinalRecord) -> Result<(), WriterError>;
}
