//! Per-panel settings and their resolution into per-channel run settings.

pub mod measurements;
pub mod method;
pub mod projection;
pub mod resolver;
pub mod roles;

pub use measurements::{Measurement, MeasurementSet};
pub use method::{
    CellposeParams, CytoplasmOptions, FindMaximaParams, MacroSegmentation, SegmentationChoice,
    SegmentationMethod, StarDistParams, ThresholdMethod, ThresholdParams,
};
pub use projection::{Preprocessing, ProjectionMethod, ProjectionSpec, SliceRange};
pub use resolver::{
    ChannelDetection, ConsistencyReport, ConsistencyWarning, ResolvedChannel,
    ResolvedChannelConfig, ResolvedConfigurationSet, SegmentationSettings, SettingsResolver,
    SpotSettings,
};
pub use roles::{
    CellConfig, CellVariant, PanelConfig, QuantificationConfig, RoleConfigurationSet,
    SegmentationConfig, SpotConfig,
};
