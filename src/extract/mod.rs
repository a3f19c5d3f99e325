//! Instruction/result extraction from conversation history buffers.

mod extractor;
mod markers;
mod record;

pub use extractor::{Backfill, Extraction, Extractor, NoBackfill};
pub use markers::{
    InstructionScan, Markers, Mode, ResultScan, ID_LEN, INSTRUCTION_END, RESULT_END,
    RESULT_PREFIX, RESULT_SUFFIX,
};
pub use record::{FinalRecord, RawRecord};
