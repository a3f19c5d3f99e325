//! Ledger error types.

use std::path::PathBuf;

/// Errors that can occur while reading or writing the ledger.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    /// Failed to create the ledger directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read an existing ledger file.
    #[error("Failed to read ledger file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to append to the active ledger file.
    #[error("Failed to append to ledger file {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rotation step failed.
    #[error("Failed to rotate ledger file {path}: {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_display() {
        let err = LedgerError::Append {
            path: PathBuf::from("/var/log/processed_ids.log"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(err.to_string().contains("Failed to append"));
        assert!(err.to_string().contains("/var/log/processed_ids.log"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_create_dir_display() {
        let err = LedgerError::CreateDir {
            path: PathBuf::from("/root/logs"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("Failed to create directory"));
        assert!(err.to_string().contains("/root/logs"));
    }
}
