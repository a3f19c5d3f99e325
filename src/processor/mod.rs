//! Processing side: the per-file pipeline and the event dispatcher in front
//! of it.

mod dispatch;
mod pipeline;
mod stats;

pub use dispatch::Dispatcher;
pub use pipeline::{ChangelogProcessor, ScanReport};
pub use stats::{ProcessorStats, StatsRecorder};
