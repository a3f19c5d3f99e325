//! Per-file read-position tracking and bounded incremental reads.

mod cursor;
mod error;
mod reader;

pub use cursor::{FileCursor, PositionStore};
pub use error::TrackerError;
pub use reader::{Chunk, FileBackfill, Reader};
