use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use super::types::BatchStatus;

/// Thread-safe progress reporting for a batch run.
///
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// The run starts with `total` used fields of view.
    fn begin(&self, _total: usize) {}

    /// `done` of `total` fields of view are processed.
    fn advance(&self, _done: usize, _total: usize) {}

    fn finish(&self, _status: BatchStatus) {}
}

pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Progress message sent from the batch thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchEvent {
    Started { total: usize },
    Progress { done: usize, total: usize },
    Finished { status: BatchStatus },
}

impl BatchEvent {
    /// Completed fraction in `0.0..=1.0`, when known.
    pub fn fraction(&self) -> Option<f64> {
        match *self {
            Self::Progress { done, total } if total > 0 => Some(done as f64 / total as f64),
            Self::Finished { .. } => Some(1.0),
            _ => None,
        }
    }
}

/// Progress reporter that sends updates over an mpsc channel.
pub struct ChannelProgressReporter {
    tx: mpsc::Sender<BatchEvent>,
    last_done: AtomicUsize,
}

impl ChannelProgressReporter {
    pub fn new(tx: mpsc::Sender<BatchEvent>) -> Self {
        Self {
            tx,
            last_done: AtomicUsize::new(0),
        }
    }

    /// Number of fields of view reported done so far.
    pub fn done(&self) -> usize {
        self.last_done.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for ChannelProgressReporter {
    fn begin(&self, total: usize) {
        self.last_done.store(0, Ordering::Relaxed);
        let _ = self.tx.send(BatchEvent::Started { total });
    }

    fn advance(&self, done: usize, total: usize) {
        self.last_done.store(done, Ordering::Relaxed);
        let _ = self.tx.send(BatchEvent::Progress { done, total });
    }

    fn finish(&self, status: BatchStatus) {
        let _ = self.tx.send(BatchEvent::Finished { status });
    }
}
