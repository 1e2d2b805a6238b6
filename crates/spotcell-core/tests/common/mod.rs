use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Mutex};

use spotcell_core::batch::CancelToken;
use spotcell_core::channel::{ChannelRegistry, Role};
use spotcell_core::error::Result;
use spotcell_core::experiment::{Experiment, ExperimentExecutor, FieldOfView, ResultTables};
use spotcell_core::preferences::MemoryStore;
use spotcell_core::settings::RoleConfigurationSet;
use spotcell_core::transition::RoleTransitionController;

/// Registry of `count` channels with the given roles and quantified channels.
pub fn registry_with(count: usize, roles: &[(usize, Role)], quantify: &[usize]) -> ChannelRegistry {
    let mut registry = ChannelRegistry::new(count);
    for &(index, role) in roles {
        registry.confirm_role(index, role).unwrap();
    }
    for &index in quantify {
        registry.set_quantify(index, true).unwrap();
    }
    registry
}

/// Normalized panels for `registry`, seeded from an empty store.
pub fn normalized(registry: &mut ChannelRegistry) -> RoleConfigurationSet {
    let mut configs = RoleConfigurationSet::default();
    RoleTransitionController::normalize(registry, &mut configs, &mut MemoryStore::new());
    configs
}

/// Field of view with one `<name>_w<c>.tif` image per channel.
pub fn fov(index: usize, name: &str, channels: &[usize]) -> FieldOfView {
    channels.iter().fold(FieldOfView::new(index), |f, &c| {
        f.with_image(c, format!("/data/{name}_w{c}.tif"))
    })
}

/// Emits one row per experiment and cancels `token` after `cancel_after`
/// experiments.
pub struct RowExecutor {
    pub token: CancelToken,
    pub cancel_after: Option<usize>,
    pub executed: AtomicUsize,
    pub interrupted: AtomicUsize,
}

impl RowExecutor {
    pub fn new(token: CancelToken, cancel_after: Option<usize>) -> Self {
        Self {
            token,
            cancel_after,
            executed: AtomicUsize::new(0),
            interrupted: AtomicUsize::new(0),
        }
    }
}

impl ExperimentExecutor for RowExecutor {
    fn execute(&self, experiment: &Experiment, tables: &mut ResultTables) -> Result<bool> {
        tables
            .table_mut("Experiments", &["field", "name"])
            .push(vec![experiment.field.to_string(), experiment.name.to_string()]);
        let n = self.executed.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_after == Some(n) {
            self.token.cancel();
        }
        Ok(true)
    }

    fn interrupt(&self, _experiment: &Experiment) {
        self.interrupted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Blocks in `execute` until a message arrives on the paired sender.
pub struct GateExecutor {
    release: Mutex<mpsc::Receiver<()>>,
}

impl GateExecutor {
    pub fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                release: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl ExperimentExecutor for GateExecutor {
    fn execute(&self, experiment: &Experiment, tables: &mut ResultTables) -> Result<bool> {
        let _ = self.release.lock().unwrap().recv();
        tables
            .table_mut("Experiments", &["name"])
            .push(vec![experiment.name.to_string()]);
        Ok(true)
    }
}
