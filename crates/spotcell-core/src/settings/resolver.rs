use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calibration::Calibration;
use crate::channel::{Channel, ChannelRegistry, Role};
use crate::error::{Result, SpotcellError};

use super::measurements::MeasurementSet;
use super::method::{CytoplasmOptions, FindMaximaParams, SegmentationMethod, ThresholdParams};
use super::projection::{ProjectionMethod, ProjectionSpec};
use super::roles::RoleConfigurationSet;

/// Segmentation plan of a Nuclei or Cell channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentationSettings {
    pub method: SegmentationMethod,
    pub exclude_on_edges: bool,
    pub final_validation: bool,
    pub save_rois: bool,
    pub save_masks: bool,
    /// Present only for a cell segmentation paired with nuclei; `extract`
    /// tells whether cytoplasm objects are produced.
    pub cytoplasm: Option<CytoplasmOptions>,
}

/// Spot detection plan. Both modes may be active at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotSettings {
    pub find_maxima: Option<FindMaximaParams>,
    pub threshold: Option<ThresholdParams>,
    pub save_rois: bool,
    pub save_masks: bool,
}

/// What a channel's detector does besides measuring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ChannelDetection {
    Segmentation(SegmentationSettings),
    Spots(SpotSettings),
    QuantificationOnly,
}

/// Fully resolved settings of one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedChannelConfig {
    pub projection: ProjectionSpec,
    pub preprocess_macro: Option<String>,
    pub measurements: MeasurementSet,
    pub detection: ChannelDetection,
    /// Measurements of the quantification pass over a Nuclei, Cell or Spot
    /// channel that is also a quantification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantification: Option<MeasurementSet>,
}

impl ResolvedChannelConfig {
    /// Settings of the quantification pass over this channel's image. Role
    /// channels keep their preprocessing and swap in their quantification
    /// measurements.
    pub fn as_quantification(&self) -> Self {
        Self {
            projection: self.projection,
            preprocess_macro: self.preprocess_macro.clone(),
            measurements: self
                .quantification
                .clone()
                .unwrap_or_else(|| self.measurements.clone()),
            detection: ChannelDetection::QuantificationOnly,
            quantification: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedChannel {
    pub channel: Channel,
    pub config: ResolvedChannelConfig,
    /// The projection was taken from the quantification panel.
    pub projection_inherited: bool,
}

/// Resolved settings of every active channel, in channel-index order.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedConfigurationSet {
    pub calibration: Calibration,
    pub channels: Vec<ResolvedChannel>,
}

impl ResolvedConfigurationSet {
    pub fn channel(&self, index: usize) -> Option<&ResolvedChannel> {
        self.channels.iter().find(|c| c.channel.index == index)
    }

    fn with_role(&self, role: Role) -> impl Iterator<Item = &ResolvedChannel> + '_ {
        self.channels.iter().filter(move |c| c.channel.role == role)
    }

    pub fn nuclei(&self) -> Option<&ResolvedChannel> {
        self.with_role(Role::Nuclei).next()
    }

    pub fn cell(&self) -> Option<&ResolvedChannel> {
        self.with_role(Role::Cell).next()
    }

    pub fn spots(&self) -> impl Iterator<Item = &ResolvedChannel> + '_ {
        self.with_role(Role::Spot)
    }

    pub fn quantification_only(&self) -> impl Iterator<Item = &ResolvedChannel> + '_ {
        self.with_role(Role::Unassigned)
    }

    /// Every channel whose pixel values are measured by the quantification
    /// pass, with or without a role, in channel-index order.
    pub fn quantified(&self) -> impl Iterator<Item = &ResolvedChannel> + '_ {
        self.channels.iter().filter(|c| c.channel.quantify)
    }

    pub fn has_spots(&self) -> bool {
        self.spots().next().is_some()
    }

    /// Collect warnings for multi-slice images whose projection is missing or
    /// borrowed from the quantification panel. `slice_count` returns the
    /// number of slices of a channel's images.
    pub fn check_consistency(
        &self,
        mut slice_count: impl FnMut(&Channel) -> usize,
    ) -> ConsistencyReport {
        let mut warnings = Vec::new();
        for rc in &self.channels {
            let slices = slice_count(&rc.channel);
            let projection = &rc.config.projection;
            if slices > 1 && !projection.enabled {
                warnings.push(ConsistencyWarning::NoProjection {
                    channel: rc.channel.index,
                    protein: rc.channel.protein_name.clone(),
                    slices,
                });
            } else if slices > 1 && rc.projection_inherited {
                warnings.push(ConsistencyWarning::InheritedProjection {
                    channel: rc.channel.index,
                    protein: rc.channel.protein_name.clone(),
                    slices,
                    method: projection.method,
                });
            }
            if let Some(range) = projection.slice_range.filter(|_| projection.enabled) {
                if slices > 0 && range.max > slices {
                    warnings.push(ConsistencyWarning::SliceRangeOutOfBounds {
                        channel: rc.channel.index,
                        max: range.max,
                        slices,
                    });
                }
            }
        }
        debug!(warnings = warnings.len(), "Consistency check");
        ConsistencyReport { warnings }
    }
}

/// Condition needing user confirmation before a run.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsistencyWarning {
    /// Multi-slice image, no projection anywhere.
    NoProjection {
        channel: usize,
        protein: String,
        slices: usize,
    },
    /// Multi-slice image, projection borrowed from the quantification panel.
    InheritedProjection {
        channel: usize,
        protein: String,
        slices: usize,
        method: ProjectionMethod,
    },
    SliceRangeOutOfBounds {
        channel: usize,
        max: usize,
        slices: usize,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProjection {
                channel,
                protein,
                slices,
            } => write!(
                f,
                "Channel {channel} ({protein}) has {slices} slices but no projection is configured"
            ),
            Self::InheritedProjection {
                channel,
                protein,
                slices,
                method,
            } => write!(
                f,
                "Channel {channel} ({protein}) has {slices} slices; using the quantification projection ({method})"
            ),
            Self::SliceRangeOutOfBounds {
                channel,
                max,
                slices,
            } => write!(
                f,
                "Channel {channel} projects up to slice {max} but images have {slices} slices"
            ),
        }
    }
}

/// All warnings of a run, presented together.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsistencyReport {
    pub warnings: Vec<ConsistencyWarning>,
}

impl ConsistencyReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn message(&self) -> String {
        self.warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Ask `confirm` when there is anything to report. Declining aborts.
    pub fn confirm(&self, confirm: impl FnOnce(&str) -> bool) -> Result<()> {
        if self.is_empty() || confirm(&self.message()) {
            Ok(())
        } else {
            Err(SpotcellError::RunDeclined)
        }
    }
}

/// Merges each channel's own panel with the quantification panel's fallbacks.
pub struct SettingsResolver<'a> {
    registry: &'a ChannelRegistry,
    configs: &'a RoleConfigurationSet,
}

impl<'a> SettingsResolver<'a> {
    pub fn new(registry: &'a ChannelRegistry, configs: &'a RoleConfigurationSet) -> Self {
        Self { registry, configs }
    }

    fn measure_selected(&self, channel: &Channel) -> bool {
        self.registry
            .position(channel.index)
            .is_some_and(|p| self.configs.quantification.measure_on.selects_position(p))
    }

    fn preprocess_selected(&self, channel: &Channel) -> bool {
        self.registry
            .position(channel.index)
            .is_some_and(|p| self.configs.quantification.preprocess_on.selects_position(p))
    }

    /// The channel panel's measurements when selected, otherwise none, plus
    /// the mandatory baseline. Shape measurements are kept for segmentation
    /// roles only.
    pub fn measurements(&self, channel: &Channel) -> MeasurementSet {
        let set = if self.measure_selected(channel) {
            self.configs.panel_for(channel).measurements().clone()
        } else {
            MeasurementSet::empty()
        };
        let set = if channel.role.is_segmentation() {
            set
        } else {
            set.without_morphological()
        };
        set.with_baseline(channel.role.is_segmentation())
    }

    /// Quantification panel measurements for a role channel that is also
    /// quantified; `None` for every other channel. Gated by `measure_on`
    /// like the channel's own set.
    pub fn quantification_measurements(&self, channel: &Channel) -> Option<MeasurementSet> {
        if channel.role == Role::Unassigned || !channel.quantify {
            return None;
        }
        let set = if self.measure_selected(channel) {
            self.configs.quantification.measurements.clone()
        } else {
            MeasurementSet::empty()
        };
        Some(set.without_morphological().with_baseline(false))
    }

    /// Own projection, or the quantification projection when the channel is
    /// selected for preprocessing and has none of its own. The flag reports
    /// the inheritance.
    pub fn projection_with_source(&self, channel: &Channel) -> (ProjectionSpec, bool) {
        let own = self.configs.panel_for(channel).preprocessing().projection;
        let fallback = self.configs.quantification.preprocessing.projection;
        if self.preprocess_selected(channel) && !own.enabled && fallback.enabled {
            (fallback, !matches!(channel.role, Role::Unassigned))
        } else {
            (own, false)
        }
    }

    pub fn projection(&self, channel: &Channel) -> ProjectionSpec {
        self.projection_with_source(channel).0
    }

    /// Own macro when enabled; otherwise the quantification macro for
    /// channels selected for preprocessing.
    pub fn preprocess_macro(&self, channel: &Channel) -> Option<String> {
        let own = self.configs.panel_for(channel).preprocessing().active_macro();
        let fallback = self.configs.quantification.preprocessing.active_macro();
        own.or_else(|| fallback.filter(|_| self.preprocess_selected(channel)))
            .map(str::to_string)
    }

    fn detection(&self, channel: &Channel) -> Result<ChannelDetection> {
        let missing = |panel: &str| {
            SpotcellError::ConfigurationIncomplete(format!(
                "{panel} panel for channel {} does not exist",
                channel.index
            ))
        };
        match channel.role {
            Role::Nuclei => {
                let cfg = self.configs.nuclei.as_ref().ok_or_else(|| missing("Nuclei"))?;
                let method = cfg.method();
                method.validate("Nuclei")?;
                Ok(ChannelDetection::Segmentation(SegmentationSettings {
                    method,
                    exclude_on_edges: cfg.exclude_on_edges,
                    final_validation: cfg.final_validation,
                    save_rois: cfg.save_rois,
                    save_masks: cfg.save_masks,
                    cytoplasm: None,
                }))
            }
            Role::Cell => {
                let cell = self.configs.cell.as_ref().ok_or_else(|| missing("Cell"))?;
                let cfg = &cell.segmentation;
                let method = cfg.method();
                method.validate("Cell")?;
                Ok(ChannelDetection::Segmentation(SegmentationSettings {
                    method,
                    exclude_on_edges: cfg.exclude_on_edges,
                    final_validation: cfg.final_validation,
                    save_rois: cfg.save_rois,
                    save_masks: cfg.save_masks,
                    cytoplasm: cell.active_cytoplasm().cloned(),
                }))
            }
            Role::Spot => {
                let cfg = self
                    .configs
                    .spot(channel.index)
                    .ok_or_else(|| missing("Spot"))?;
                let settings = SpotSettings {
                    find_maxima: cfg.active_find_maxima().cloned(),
                    threshold: cfg.active_threshold().cloned(),
                    save_rois: cfg.save_rois,
                    save_masks: cfg.save_masks,
                };
                if settings.find_maxima.is_none() && settings.threshold.is_none() {
                    return Err(SpotcellError::ConfigurationIncomplete(format!(
                        "Spot channel {} ({}) has no detection mode",
                        channel.index, channel.protein_name
                    )));
                }
                Ok(ChannelDetection::Spots(settings))
            }
            Role::Unassigned => Ok(ChannelDetection::QuantificationOnly),
        }
    }

    pub fn resolve_channel(&self, channel: &Channel) -> Result<ResolvedChannel> {
        let (projection, projection_inherited) = self.projection_with_source(channel);
        if projection_inherited {
            debug!(
                channel = channel.index,
                method = %projection.method,
                "Projection inherited from quantification panel"
            );
        }
        Ok(ResolvedChannel {
            channel: channel.clone(),
            config: ResolvedChannelConfig {
                projection,
                preprocess_macro: self.preprocess_macro(channel),
                measurements: self.measurements(channel),
                detection: self.detection(channel)?,
                quantification: self.quantification_measurements(channel),
            },
            projection_inherited,
        })
    }

    /// Resolve every active channel. Fails on the first incomplete panel.
    pub fn resolve(&self, calibration: &Calibration) -> Result<ResolvedConfigurationSet> {
        let channels = self
            .registry
            .active_channels()
            .map(|c| self.resolve_channel(c))
            .collect::<Result<Vec<_>>>()?;
        if channels.is_empty() {
            return Err(SpotcellError::ConfigurationIncomplete(
                "no channel has a role or is quantified".to_string(),
            ));
        }
        info!(
            channels = channels.len(),
            calibration = %calibration.name,
            "Resolved configuration"
        );
        Ok(ResolvedConfigurationSet {
            calibration: calibration.clone(),
            channels,
        })
    }
}
