//! Roovision - changelog extraction from Roo Code orchestrator conversations.

pub mod changelog;
pub mod config;
pub mod display;
pub mod extract;
pub mod format;
pub mod ledger;
pub mod processor;
pub mod tracker;
pub mod watcher;
