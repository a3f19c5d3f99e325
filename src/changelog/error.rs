//! Writer error types.

use std::path::PathBuf;

/// Errors that can occur while writing a changelog file.
#[derive(thiserror::Error, Debug)]
pub enum WriterError {
    /// Failed to create the output directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write or rename the changelog file.
    #[error("Failed to write changelog {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
