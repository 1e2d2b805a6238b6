use std::sync::Mutex;

use ndarray::Array3;
use tracing::{debug, warn};

use crate::channel::Role;
use crate::error::Result;

use super::assembler::{ChannelPlan, Experiment};
use super::fov::ImageRef;
use super::results::ResultTables;

/// Pixel data of one channel image, indexed `[slice, row, column]`.
#[derive(Clone, Debug)]
pub struct ImageStack {
    pub name: String,
    pub data: Array3<f32>,
}

impl ImageStack {
    pub fn new(name: impl Into<String>, data: Array3<f32>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn slice_count(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }
}

/// Opens channel images. Decoding is left to the implementor.
pub trait ImageSource: Send + Sync {
    fn load(&self, image: &ImageRef) -> Result<ImageStack>;

    /// Number of Z slices without reading pixel data.
    fn slice_count(&self, image: &ImageRef) -> Result<usize>;
}

/// Detects or measures the objects of one channel of one experiment.
pub trait Detector: Send {
    fn experiment_name(&self) -> &str;

    /// Process `image`, appending rows to `tables`. `false` means the
    /// detector stopped without a result (e.g. the user rejected it).
    fn run(&mut self, image: &ImageStack, tables: &mut ResultTables) -> bool;

    /// Abort interactive work left open by `run`.
    fn interrupt(&mut self) {}
}

pub trait DetectorFactory: Send + Sync {
    fn create(&self, role: Role, experiment: &Experiment, plan: &ChannelPlan) -> Box<dyn Detector>;
}

/// Runs one experiment. The batch runner only sees this seam.
pub trait ExperimentExecutor: Send + Sync {
    /// `Ok(false)` when a detector stopped early.
    fn execute(&self, experiment: &Experiment, tables: &mut ResultTables) -> Result<bool>;

    /// Abort whatever `execute` left running for `experiment`.
    fn interrupt(&self, _experiment: &Experiment) {}
}

/// Loads each image and drives nuclei, cell, spot and quantification
/// detectors in that order.
pub struct DetectorExecutor<S, F> {
    source: S,
    factory: F,
    /// Detectors of the last executed experiment.
    active: Mutex<Vec<Box<dyn Detector>>>,
}

impl<S: ImageSource, F: DetectorFactory> DetectorExecutor<S, F> {
    pub fn new(source: S, factory: F) -> Self {
        Self {
            source,
            factory,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: ImageSource, F: DetectorFactory> ExperimentExecutor for DetectorExecutor<S, F> {
    fn execute(&self, experiment: &Experiment, tables: &mut ResultTables) -> Result<bool> {
        let mut detectors = Vec::with_capacity(experiment.plan_count());
        let mut complete = true;
        for (role, plan) in experiment.plans() {
            let image = self.source.load(&plan.image)?;
            let mut detector = self.factory.create(role, experiment, plan);
            debug!(
                experiment = %experiment.name,
                channel = plan.channel,
                %role,
                slices = image.slice_count(),
                "Running detector"
            );
            let ok = detector.run(&image, tables);
            detectors.push(detector);
            if !ok {
                warn!(experiment = %experiment.name, channel = plan.channel, "Detector stopped early");
                complete = false;
                break;
            }
        }
        if let Ok(mut active) = self.active.lock() {
            *active = detectors;
        }
        Ok(complete)
    }

    fn interrupt(&self, experiment: &Experiment) {
        if let Ok(mut active) = self.active.lock() {
            for detector in active
                .iter_mut()
                .filter(|d| d.experiment_name() == experiment.name.as_str())
            {
                detector.interrupt();
            }
            active.clear();
        }
    }
}
