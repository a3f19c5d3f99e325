//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while discovering or watching conversation files.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Watch root does not exist.
    #[error("Watch path does not exist: {0}")]
    MissingRoot(PathBuf),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error.
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_display() {
        let err = WatcherError::MissingRoot(PathBuf::from("/tmp/tasks"));
        assert_eq!(err.to_string(), "Watch path does not exist: /tmp/tasks");
    }

    #[test]
    fn test_channel_closed_display() {
        let err = WatcherError::ChannelClosed;
        assert_eq!(err.to_string(), "Channel closed");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let watcher_err: WatcherError = io_err.into();
        assert!(matches!(watcher_err, WatcherError::Io(_)));
        assert!(watcher_err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_from_notify_error() {
        let notify_err = notify::Error::generic("test error");
        let watcher_err: WatcherError = notify_err.into();
        assert!(matches!(watcher_err, WatcherError::Notify(_)));
        assert!(watcher_err.to_string().contains("File watcher error"));
    }
}
