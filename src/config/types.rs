//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::Mode;

/// Name of the conversation file Roo Code writes in each task folder.
pub const DEFAULT_CONVERSATION_FILENAME: &str = "api_conversation_history.json";

/// Runtime configuration for roovision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoovisionConfig {
    /// Roo Code tasks folder to watch.
    pub tasks_path: PathBuf,
    /// Where changelog files are written.
    pub output_path: PathBuf,
    /// Where the processed-ID ledger lives.
    pub ledger_path: PathBuf,
    /// File name to watch inside each task folder.
    pub conversation_filename: String,
    /// Largest incremental read per scan.
    pub max_read_bytes: u64,
    /// Largest extra read when a result's end marker is past the buffer.
    pub lookahead_bytes: u64,
    /// Largest extra read when a result's instruction precedes the buffer.
    pub lookbehind_bytes: u64,
    /// Quiet period before a changed file is scanned.
    pub debounce_ms: u64,
    /// Only track files modified within this many days (0 tracks all).
    pub max_file_age_days: u64,
    /// Size at which the active ledger file rotates.
    pub max_log_file_size_bytes: u64,
    /// Rotated ledger files kept.
    pub log_rotation_count: u32,
    /// Modes recorded in the ledger but not written out.
    pub skip_modes: Vec<Mode>,
}

fn default_tasks_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Code")
        .join("User")
        .join("globalStorage")
        .join("rooveterinaryinc.roo-cline")
        .join("tasks")
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roovision")
}

impl Default for RoovisionConfig {
    fn default() -> Self {
        Self {
            tasks_path: default_tasks_path(),
            output_path: default_data_dir().join("changelogs"),
            ledger_path: default_data_dir().join("logs"),
            conversation_filename: DEFAULT_CONVERSATION_FILENAME.to_string(),
            max_read_bytes: 5 * 1024 * 1024,
            lookahead_bytes: 512 * 1024,
            lookbehind_bytes: 8 * 1024 * 1024,
            debounce_ms: 500,
            max_file_age_days: 7,
            max_log_file_size_bytes: 1024 * 1024,
            log_rotation_count: 3,
            skip_modes: vec![Mode::Ask],
        }
    }
}

impl RoovisionConfig {
    /// Check every numeric limit once, before anything runs.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let positive = [
            ("max_read_bytes", self.max_read_bytes),
            ("lookahead_bytes", self.lookahead_bytes),
            ("lookbehind_bytes", self.lookbehind_bytes),
            ("debounce_ms", self.debounce_ms),
            ("max_log_file_size_bytes", self.max_log_file_size_bytes),
            ("log_rotation_count", u64::from(self.log_rotation_count)),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(InvalidConfig {
                field,
                reason: "must be a positive integer",
            });
        }
        if self.conversation_filename.trim().is_empty() {
            return Err(InvalidConfig {
                field: "conversation_filename",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    /// Whether records in `mode` are written out.
    #[must_use]
    pub fn emits_mode(&self, mode: Mode) -> bool {
        !self.skip_modes.contains(&mode)
    }
}

/// A configuration value outside its allowed range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid configuration: {field} {reason}")]
pub struct InvalidConfig {
    pub field: &'static str,
    pub reason: &'static str,
}
