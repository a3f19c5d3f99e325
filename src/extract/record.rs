//! Extracted subtask records.

use chrono::{DateTime, Utc};

use super::markers::Mode;

/// An instruction/result pair as found in the log, still JSON-escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Subtask identifier.
    pub id: String,
    /// Mode the subtask was delegated to.
    pub mode: Mode,
    /// Instruction body, escaped.
    pub instruction: String,
    /// Result body, escaped.
    pub result: String,
    /// Absolute offset of the result-start marker.
    pub result_start: u64,
    /// Absolute offset one past the result-end marker.
    pub result_end: u64,
}

/// A record ready to hand to a [`RecordSink`](crate::changelog::RecordSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalRecord {
    pub id: String,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    pub instruction: String,
    pub result: String,
}
