use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{Result, SpotcellError};
use crate::experiment::{
    EndingPattern, Experiment, ExperimentAssembler, ExperimentExecutor, FieldOfView, ResultTables,
};
use crate::settings::ResolvedConfigurationSet;

use super::progress::ProgressReporter;
use super::types::{BatchOutcome, BatchStatus, CancelToken, RunState};

/// Inputs of one batch run, owned so the run can move to a worker thread.
#[derive(Clone, Debug)]
pub struct BatchJob {
    pub fields: Vec<FieldOfView>,
    pub resolved: ResolvedConfigurationSet,
    pub pattern: EndingPattern,
}

/// Runs experiments field of view by field of view.
///
/// The state is shared, so a clone observes the same run.
#[derive(Clone, Debug, Default)]
pub struct BatchRunner {
    state: Arc<AtomicU8>,
}

/// Returns the runner to Idle if a run ends without reaching a final state.
struct RunningGuard<'a>(&'a AtomicU8);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let _ = self.0.compare_exchange(
            RunState::Running as u8,
            RunState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn enter_running(&self) -> Result<()> {
        let current = self.state();
        if current == RunState::Running {
            return Err(SpotcellError::AlreadyRunning);
        }
        self.state
            .compare_exchange(
                current as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|_| SpotcellError::AlreadyRunning)
    }

    /// Process every used field of view in index order.
    ///
    /// `cancel` is checked before each field of view. On cancellation the
    /// last executed experiment is interrupted and the rows gathered so far
    /// are returned; the runner passes through Cancelled back to Idle.
    pub fn run(
        &self,
        job: &BatchJob,
        executor: &dyn ExperimentExecutor,
        cancel: &CancelToken,
        progress: &dyn ProgressReporter,
    ) -> Result<BatchOutcome> {
        self.enter_running()?;
        let _guard = RunningGuard(&self.state);
        let start = Instant::now();

        let mut fields: Vec<&FieldOfView> = job.fields.iter().filter(|f| f.used).collect();
        fields.sort_by_key(|f| f.index);
        let total = fields.len();
        info!(fields = total, channels = job.resolved.channels.len(), "Batch started");
        progress.begin(total);

        let mut tables = ResultTables::new();
        let mut last: Option<Experiment> = None;
        for (i, fov) in fields.iter().enumerate() {
            if cancel.is_cancelled() {
                if let Some(experiment) = &last {
                    executor.interrupt(experiment);
                }
                self.set_state(RunState::Cancelled);
                info!(processed = i, total, rows = tables.total_rows(), "Batch cancelled");
                progress.finish(BatchStatus::Cancelled);
                self.set_state(RunState::Idle);
                return Ok(BatchOutcome {
                    status: BatchStatus::Cancelled,
                    tables,
                    processed: i,
                    total,
                });
            }

            let experiments = ExperimentAssembler::assemble(fov, &job.resolved, &job.pattern)?;
            for experiment in experiments {
                let mut rows = ResultTables::new();
                let complete = executor.execute(&experiment, &mut rows)?;
                if !complete {
                    warn!(experiment = %experiment.name, field = fov.index, "Experiment incomplete");
                }
                tables.append(rows);
                last = Some(experiment);
            }
            progress.advance(i + 1, total);
        }

        self.set_state(RunState::Completed);
        info!(
            processed = total,
            rows = tables.total_rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch completed"
        );
        progress.finish(BatchStatus::Completed);
        Ok(BatchOutcome {
            status: BatchStatus::Completed,
            tables,
            processed: total,
            total,
        })
    }

    /// Run `job` on a named worker thread.
    pub fn spawn(
        &self,
        job: BatchJob,
        executor: Arc<dyn ExperimentExecutor>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<BatchHandle> {
        if self.state() == RunState::Running {
            return Err(SpotcellError::AlreadyRunning);
        }
        let cancel = CancelToken::new();
        let runner = self.clone();
        let token = cancel.clone();
        let join = std::thread::Builder::new()
            .name("spotcell-batch".into())
            .spawn(move || runner.run(&job, executor.as_ref(), &token, progress.as_ref()))?;
        Ok(BatchHandle { cancel, join })
    }
}

/// A batch running on its worker thread.
pub struct BatchHandle {
    cancel: CancelToken,
    join: JoinHandle<Result<BatchOutcome>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Wait for the worker thread.
    pub fn join(self) -> Result<BatchOutcome> {
        self.join
            .join()
            .map_err(|_| SpotcellError::Execution("batch thread panicked".to_string()))?
    }
}
