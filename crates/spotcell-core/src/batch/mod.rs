//! Batch execution over fields of view and single-experiment previews.

mod preview;
mod progress;
mod runner;
mod types;

pub use preview::PreviewSlot;
pub use progress::{BatchEvent, ChannelProgressReporter, NoOpReporter, ProgressReporter};
pub use runner::{BatchHandle, BatchJob, BatchRunner};
pub use types::{BatchOutcome, BatchStatus, CancelToken, RunState};
