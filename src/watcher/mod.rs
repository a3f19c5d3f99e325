//! Watcher module for Roo Code task folders.
//!
//! Finds conversation files at startup and turns filesystem notifications
//! into per-file change events.

mod discovery;
mod error;
mod task_watcher;

pub use discovery::{discover_conversation_files, is_conversation_file, Discovery};
pub use error::WatcherError;
pub use task_watcher::{TaskWatcher, WatchEvent};
