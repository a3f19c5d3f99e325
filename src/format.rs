//! Turns JSON-escaped record text into presentable markdown.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::extract::{FinalRecord, RawRecord};

/// Shallowest heading level allowed inside instruction/result text.
///
/// The changelog layout uses levels 1 and 2 for its own sections.
pub const MIN_HEADING_LEVEL: usize = 3;

const MAX_HEADING_LEVEL: usize = 6;

/// Unescapes and renormalises record text.
#[derive(Debug, Clone)]
pub struct Formatter {
    heading: Regex,
    min_heading_level: usize,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    /// # Panics
    ///
    /// Never in practice: the heading pattern is a fixed literal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heading: Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading pattern is valid"),
            min_heading_level: MIN_HEADING_LEVEL,
        }
    }

    /// Format `raw` as completed at `timestamp`.
    #[must_use]
    pub fn format(&self, raw: &RawRecord, timestamp: DateTime<Utc>) -> FinalRecord {
        FinalRecord {
            id: raw.id.clone(),
            mode: raw.mode,
            timestamp,
            instruction: self.render(&raw.instruction),
            result: self.render(&raw.result),
        }
    }

    fn render(&self, escaped: &str) -> String {
        self.adjust_headings(&tidy(&unescape(escaped)))
    }

    /// Push headings down so the shallowest one sits at the minimum level.
    ///
    /// Every heading moves by the same amount, so relative nesting is kept;
    /// levels saturate at 6. Lines inside fenced code blocks are left alone.
    #[must_use]
    pub fn adjust_headings(&self, text: &str) -> String {
        let mut in_fence = false;
        let mut shallowest = None;
        for line in text.lines() {
            if is_fence(line) {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(caps) = self.heading.captures(line) {
                let level = caps[1].len();
                shallowest = Some(shallowest.map_or(level, |s: usize| s.min(level)));
            }
        }

        let shift = match shallowest {
            Some(level) if level < self.min_heading_level => self.min_heading_level - level,
            _ => return text.to_string(),
        };

        in_fence = false;
        text.split('\n')
            .map(|line| {
                if is_fence(line) {
                    in_fence = !in_fence;
                    return line.to_string();
                }
                match self.heading.captures(line) {
                    Some(caps) if !in_fence => {
                        let level = (caps[1].len() + shift).min(MAX_HEADING_LEVEL);
                        format!("{} {}", "#".repeat(level), &caps[2])
                    }
                    _ => line.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Undo the JSON escaping left in a raw record body.
///
/// Order matters: doubled escapes are replaced before single ones so a
/// backslash-backslash-n sequence becomes one newline rather than a stray
/// backslash followed by a newline.
#[must_use]
pub fn unescape(text: &str) -> String {
    text.replace("\\\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\\\\"", "\"")
        .replace("\\\"", "\"")
        .replace("\\r", "")
        .replace('\r', "")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}

/// Collapse runs of four or more newlines to three and trim the ends.
#[must_use]
pub fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines > 3 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(c);
    }
    out.trim().to_string()
}
