//! Literal markers delimiting instructions and results in conversation logs.
//!
//! The conversation history is JSON written by Roo Code; the markers below
//! are the raw JSON text around each field, so escaped newlines appear as a
//! backslash followed by `n`.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use memchr::memmem;
use serde::{Deserialize, Serialize};

/// Opening text of a completed subtask result, before the identifier.
pub const RESULT_PREFIX: &[u8] = b"\"content\":\"Subtask ";

/// Text between the identifier and the result body.
pub const RESULT_SUFFIX: &[u8] = br" completed.\n\nResult:\n";

/// Closing text of a result body.
pub const RESULT_END: &[u8] = b"\"},{\"type\":\"text\",\"text\":\"<environment_details>";

/// Closing text of an instruction body.
pub const INSTRUCTION_END: &[u8] = b"\",\"todos\":\"";

/// Length of the identifier token.
pub const ID_LEN: usize = 36;

/// Orchestrator mode a subtask was delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Ask,
    Code,
    Debug,
    Architect,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Ask, Mode::Code, Mode::Debug, Mode::Architect];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Code => "code",
            Self::Debug => "debug",
            Self::Architect => "architect",
        }
    }

    /// Literal opening an instruction delegated to this mode.
    #[must_use]
    pub fn instruction_start(self) -> &'static [u8] {
        match self {
            Self::Ask => b"\"name\":\"new_task\",\"input\":{\"mode\":\"ask\",\"message\":\"",
            Self::Code => b"\"name\":\"new_task\",\"input\":{\"mode\":\"code\",\"message\":\"",
            Self::Debug => b"\"name\":\"new_task\",\"input\":{\"mode\":\"debug\",\"message\":\"",
            Self::Architect => {
                b"\"name\":\"new_task\",\"input\":{\"mode\":\"architect\",\"message\":\""
            }
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mode: {s}"))
    }
}

/// Outcome of parsing a result header at a result-prefix match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultScan {
    /// Header and end marker both present. Ranges are relative to the
    /// window the scan ran on.
    Complete {
        id: String,
        body: Range<usize>,
        end: usize,
    },
    /// Window ends before the header or the end marker is complete.
    Incomplete,
    /// The prefix is not followed by a well-formed identifier and suffix.
    NotAResult,
}

/// Outcome of looking for the instruction that precedes a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionScan {
    /// Nearest unconsumed instruction, body range relative to the region.
    Found { mode: Mode, body: Range<usize> },
    /// No instruction start anywhere in the region.
    Missing,
    /// The nearest instruction already belongs to an earlier result.
    Consumed,
    /// The nearest instruction has no end marker before the result.
    Unterminated,
}

/// Prebuilt substring finders for every marker.
pub struct Markers {
    result_prefix: memmem::Finder<'static>,
    result_end: memmem::Finder<'static>,
    instruction_end: memmem::Finder<'static>,
    instruction_starts: Vec<(Mode, memmem::FinderRev<'static>)>,
}

impl Markers {
    #[must_use]
    pub fn new() -> Self {
        Self {
            result_prefix: memmem::Finder::new(RESULT_PREFIX),
            result_end: memmem::Finder::new(RESULT_END),
            instruction_end: memmem::Finder::new(INSTRUCTION_END),
            instruction_starts: Mode::ALL
                .into_iter()
                .map(|m| (m, memmem::FinderRev::new(m.instruction_start())))
                .collect(),
        }
    }

    /// Position of the first result prefix in `haystack`.
    #[must_use]
    pub fn find_result_prefix(&self, haystack: &[u8]) -> Option<usize> {
        self.result_prefix.find(haystack)
    }

    /// Parse a result whose prefix starts at the beginning of `window`.
    #[must_use]
    pub fn scan_result(&self, window: &[u8]) -> ResultScan {
        let id_start = RESULT_PREFIX.len();
        let id_end = id_start + ID_LEN;
        let body_start = id_end + RESULT_SUFFIX.len();

        let Some(id_bytes) = window.get(id_start..id_end) else {
            return Self::truncated_header(window, id_start);
        };
        if !is_identifier(id_bytes) {
            return ResultScan::NotAResult;
        }
        let Some(suffix) = window.get(id_end..body_start) else {
            let seen = &window[id_end..];
            return if RESULT_SUFFIX.starts_with(seen) {
                ResultScan::Incomplete
            } else {
                ResultScan::NotAResult
            };
        };
        if suffix != RESULT_SUFFIX {
            return ResultScan::NotAResult;
        }

        match self.result_end.find(&window[body_start..]) {
            Some(rel) => ResultScan::Complete {
                id: String::from_utf8_lossy(id_bytes).into_owned(),
                body: body_start..body_start + rel,
                end: body_start + rel + RESULT_END.len(),
            },
            None => ResultScan::Incomplete,
        }
    }

    /// Classify a header cut off inside the identifier.
    fn truncated_header(window: &[u8], id_start: usize) -> ResultScan {
        let partial = window.get(id_start..).unwrap_or_default();
        let plausible = partial
            .iter()
            .enumerate()
            .all(|(i, &b)| is_identifier_byte(i, b));
        if plausible {
            ResultScan::Incomplete
        } else {
            ResultScan::NotAResult
        }
    }

    /// Find the instruction nearest to the end of `region`.
    ///
    /// `region` must end exactly where the result being paired starts. A
    /// result between the instruction and the end of the region means the
    /// instruction was consumed by that earlier result. Prefix text that does
    /// not parse as a result header does not count.
    #[must_use]
    pub fn scan_instruction(&self, region: &[u8]) -> InstructionScan {
        let nearest = self
            .instruction_starts
            .iter()
            .filter_map(|(mode, finder)| finder.rfind(region).map(|pos| (pos, *mode)))
            .max_by_key(|(pos, _)| *pos);

        let Some((start, mode)) = nearest else {
            return InstructionScan::Missing;
        };
        let body_start = start + mode.instruction_start().len();
        let tail = &region[body_start..];

        let consumed = self
            .result_prefix
            .find_iter(tail)
            .any(|pos| self.scan_result(&tail[pos..]) != ResultScan::NotAResult);
        if consumed {
            return InstructionScan::Consumed;
        }
        match self.instruction_end.find(tail) {
            Some(rel) => InstructionScan::Found {
                mode,
                body: body_start..body_start + rel,
            },
            None => InstructionScan::Unterminated,
        }
    }

    /// Start of the longest suffix of `buf` that is a proper prefix of the
    /// result prefix, meaning the marker may continue in the next read.
    #[must_use]
    pub fn partial_result_prefix_at_end(&self, buf: &[u8]) -> Option<usize> {
        let longest = RESULT_PREFIX.len().saturating_sub(1).min(buf.len());
        (1..=longest)
            .rev()
            .find(|&n| buf.ends_with(&RESULT_PREFIX[..n]))
            .map(|n| buf.len() - n)
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Markers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Markers").finish_non_exhaustive()
    }
}

/// Lowercase hyphenated UUID, the identifier format Roo Code uses.
fn is_identifier(bytes: &[u8]) -> bool {
    bytes.len() == ID_LEN
        && bytes.iter().enumerate().all(|(i, &b)| is_identifier_byte(i, b))
        && uuid::Uuid::try_parse_ascii(bytes).is_ok()
}

fn is_identifier_byte(index: usize, byte: u8) -> bool {
    match index {
        8 | 13 | 18 | 23 => byte == b'-',
        _ => byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte),
    }
}
