pub mod assembler;
pub mod detector;
pub mod fov;
pub mod naming;
pub mod results;

pub use assembler::{ChannelPlan, Experiment, ExperimentAssembler};
pub use detector::{
    Detector, DetectorExecutor, DetectorFactory, ExperimentExecutor, ImageSource, ImageStack,
};
pub use fov::{discover_fields_of_view, FieldOfView, ImageRef};
pub use naming::{EndingPattern, ExperimentName};
pub use results::{ResultTable, ResultTables};
