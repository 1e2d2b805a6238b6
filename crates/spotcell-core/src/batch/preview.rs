use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::debug;

use crate::error::{Result, SpotcellError};
use crate::experiment::{Experiment, ExperimentExecutor, ResultTables};
use crate::transition::PanelId;

/// Clears the busy flag when the preview thread ends, panics included.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// At most one running preview per panel.
#[derive(Clone, Debug)]
pub struct PreviewSlot {
    panel: PanelId,
    busy: Arc<AtomicBool>,
}

impl PreviewSlot {
    pub fn new(panel: PanelId) -> Self {
        Self {
            panel,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn panel(&self) -> PanelId {
        self.panel
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run `experiment` on a short-lived worker thread.
    pub fn start(
        &self,
        experiment: Experiment,
        executor: Arc<dyn ExperimentExecutor>,
    ) -> Result<JoinHandle<Result<ResultTables>>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SpotcellError::PreviewBusy(self.panel.to_string()));
        }
        let guard = BusyGuard(Arc::clone(&self.busy));
        let panel = self.panel;
        let spawned = std::thread::Builder::new()
            .name(format!("spotcell-preview-{panel}"))
            .spawn(move || -> Result<ResultTables> {
                let _guard = guard;
                debug!(%panel, experiment = %experiment.name, "Preview started");
                let mut tables = ResultTables::new();
                executor.execute(&experiment, &mut tables)?;
                Ok(tables)
            });
        // A failed spawn drops the closure and its guard, freeing the slot.
        Ok(spawned?)
    }
}
