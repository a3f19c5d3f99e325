//! Paired-marker extraction over incremental buffers.
//!
//! Results are located first; each complete result is then paired with the
//! nearest preceding instruction that no earlier result has claimed. A
//! result whose end marker is not yet written stops the scan and becomes the
//! resume point for the next read.

use std::borrow::Cow;
use std::ops::Range;

use super::markers::{InstructionScan, Markers, Mode, ResultScan};
use super::record::RawRecord;

/// Extra reads the extractor may request when a buffer is not enough.
pub trait Backfill {
    /// Bytes starting at `from`, bounded by the look-ahead cap.
    fn ahead(&mut self, from: u64) -> Option<Vec<u8>>;

    /// Bytes ending just before `before`, bounded by the look-behind cap,
    /// with the absolute offset of the first byte.
    fn behind(&mut self, before: u64) -> Option<(u64, Vec<u8>)>;
}

/// Backfill that never supplies anything; extraction sees only the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackfill;

impl Backfill for NoBackfill {
    fn ahead(&mut self, _from: u64) -> Option<Vec<u8>> {
        None
    }

    fn behind(&mut self, _before: u64) -> Option<(u64, Vec<u8>)> {
        None
    }
}

/// Result of scanning one buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Complete records in file order.
    pub records: Vec<RawRecord>,
    /// Where the next scan must restart, if a pattern was left incomplete.
    pub resume_offset: Option<u64>,
    /// Absolute offset through which the content has been accounted for.
    /// Past the buffer end when a look-ahead completed a trailing result.
    pub scanned_to: u64,
    /// Results dropped for lack of a matching instruction.
    pub dropped: usize,
}

enum Located<'b> {
    Complete {
        window: Cow<'b, [u8]>,
        id: String,
        body: Range<usize>,
        end: usize,
    },
    NotAResult,
    Pending,
}

/// Scans buffers for instruction/result pairs.
#[derive(Debug, Default)]
pub struct Extractor {
    markers: Markers,
}

impl Extractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract every complete pair from `buf`, which starts at absolute
    /// offset `base` in its file.
    pub fn extract<B: Backfill + ?Sized>(
        &self,
        buf: &[u8],
        base: u64,
        backfill: &mut B,
    ) -> Extraction {
        let mut out = Extraction {
            scanned_to: base + buf.len() as u64,
            ..Extraction::default()
        };
        let mut cursor = 0;
        // Instructions before `floor` belong to results already paired.
        let mut floor = 0;

        while let Some(rel) = self.markers.find_result_prefix(&buf[cursor..]) {
            let start = cursor + rel;
            let abs_start = base + start as u64;

            let (window, id, body, end) = match self.locate_result(&buf[start..], abs_start, backfill)
            {
                Located::Complete {
                    window,
                    id,
                    body,
                    end,
                } => (window, id, body, end),
                Located::NotAResult => {
                    cursor = start + 1;
                    continue;
                }
                Located::Pending => {
                    tracing::debug!(offset = abs_start, "Result incomplete, resuming here next time");
                    out.resume_offset = Some(abs_start);
                    break;
                }
            };

            let abs_end = abs_start + end as u64;
            let paired = self.pair_instruction(&buf[floor..start], floor == 0, &id, abs_start, backfill);

            cursor = (start + end).min(buf.len());
            floor = cursor;
            out.scanned_to = out.scanned_to.max(abs_end);

            match paired {
                Some((mode, instruction)) => {
                    tracing::debug!(subtask_id = %id, %mode, offset = abs_start, "Found complete subtask");
                    out.records.push(RawRecord {
                        id,
                        mode,
                        instruction,
                        result: String::from_utf8_lossy(&window[body]).into_owned(),
                        result_start: abs_start,
                        result_end: abs_end,
                    });
                }
                None => out.dropped += 1,
            }
        }

        if out.resume_offset.is_none() {
            if let Some(tail) = self.markers.partial_result_prefix_at_end(&buf[cursor..]) {
                out.resume_offset = Some(base + (cursor + tail) as u64);
            }
        }

        out
    }

    fn locate_result<'b, B: Backfill + ?Sized>(
        &self,
        window: &'b [u8],
        abs_start: u64,
        backfill: &mut B,
    ) -> Located<'b> {
        match self.markers.scan_result(window) {
            ResultScan::Complete { id, body, end } => Located::Complete {
                window: Cow::Borrowed(window),
                id,
                body,
                end,
            },
            ResultScan::NotAResult => Located::NotAResult,
            ResultScan::Incomplete => {
                let Some(ahead) = backfill.ahead(abs_start) else {
                    return Located::Pending;
                };
                match self.markers.scan_result(&ahead) {
                    ResultScan::Complete { id, body, end } => Located::Complete {
                        window: Cow::Owned(ahead),
                        id,
                        body,
                        end,
                    },
                    ResultScan::NotAResult => Located::NotAResult,
                    ResultScan::Incomplete => {
                        tracing::debug!(
                            offset = abs_start,
                            window = ahead.len(),
                            "End marker not within look-ahead window"
                        );
                        Located::Pending
                    }
                }
            }
        }
    }

    /// Pair a result with its instruction.
    ///
    /// `region` runs from the end of the previous result in this buffer (or
    /// the buffer start) to the result start. The look-behind read is only
    /// allowed when no earlier result in the buffer could have claimed the
    /// instruction.
    fn pair_instruction<B: Backfill + ?Sized>(
        &self,
        region: &[u8],
        may_look_behind: bool,
        id: &str,
        abs_start: u64,
        backfill: &mut B,
    ) -> Option<(Mode, String)> {
        let mut scan = self.markers.scan_instruction(region);

        if scan == InstructionScan::Missing && may_look_behind {
            if let Some((window_start, window)) = backfill.behind(abs_start) {
                tracing::debug!(
                    subtask_id = %id,
                    window_start,
                    "Instruction not in buffer, searched look-behind window"
                );
                scan = self.markers.scan_instruction(&window);
                if let InstructionScan::Found { mode, body } = scan {
                    return Some((mode, String::from_utf8_lossy(&window[body]).into_owned()));
                }
            }
        }

        if let InstructionScan::Found { mode, body } = scan {
            return Some((mode, String::from_utf8_lossy(&region[body]).into_owned()));
        }

        tracing::warn!(
            subtask_id = %id,
            offset = abs_start,
            reason = ?scan,
            "Found result but no matching instruction, skipping"
        );
        None
    }
}
