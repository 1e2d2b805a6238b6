//! Human-readable parameter log.
//!
//! A run appends the settings of every channel to `Parameters.txt` in the
//! working directory. The same text can be read back to restore a session.

mod parser;
mod writer;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::channel::{ChannelRegistry, Role};
use crate::consts::PARAMETER_LOG_FILE;
use crate::error::Result;
use crate::preferences::ConfigStore;
use crate::settings::resolver::{ChannelDetection, ResolvedChannelConfig, ResolvedConfigurationSet};
use crate::settings::roles::RoleConfigurationSet;
use crate::settings::MeasurementSet;
use crate::transition::{RoleTransitionController, Transition};

/// Settings of one channel as recorded in a log.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelRecord {
    pub index: usize,
    pub protein_name: String,
    pub used: bool,
    pub role: Role,
    /// `None` for channels with nothing to do.
    pub config: Option<ResolvedChannelConfig>,
}

/// Structured content of one parameter log entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterDocument {
    pub header: String,
    /// Calibration name.
    pub calibration: Option<String>,
    pub channels: Vec<ChannelRecord>,
}

impl ParameterDocument {
    /// One record per registry channel; active channels carry their resolved settings.
    pub fn from_resolved(
        header: impl Into<String>,
        registry: &ChannelRegistry,
        resolved: &ResolvedConfigurationSet,
    ) -> Self {
        let channels = registry
            .channels()
            .iter()
            .map(|c| ChannelRecord {
                index: c.index,
                protein_name: c.protein_name.clone(),
                used: c.used,
                role: c.role,
                config: resolved.channel(c.index).map(|rc| rc.config.clone()),
            })
            .collect();
        Self {
            header: header.into(),
            calibration: Some(resolved.calibration.name.clone()),
            channels,
        }
    }

    pub fn record(&self, index: usize) -> Option<&ChannelRecord> {
        self.channels.iter().find(|r| r.index == index)
    }

    /// Restore channel flags, roles and panel settings from this document.
    ///
    /// Panels are created through [`RoleTransitionController`] and then
    /// overwritten with the recorded values.
    pub fn apply(
        &self,
        registry: &mut ChannelRegistry,
        configs: &mut RoleConfigurationSet,
        store: &mut dyn ConfigStore,
    ) -> Result<Transition> {
        for record in &self.channels {
            let channel = registry.channel_mut(record.index)?;
            channel.protein_name = record.protein_name.clone();
            channel.used = record.used;
            channel.role = record.role;
            channel.quantify = match (&record.config, record.role) {
                (config, Role::Unassigned) => config.is_some(),
                (Some(config), _) => config.quantification.is_some(),
                (None, _) => channel.quantify,
            };
        }
        let transition = RoleTransitionController::normalize(registry, configs, store);

        for record in &self.channels {
            let Some(config) = &record.config else {
                continue;
            };
            let position = registry.position(record.index);
            let baseline = MeasurementSet::empty().with_baseline(record.role.is_segmentation());
            let selected = config.measurements != baseline;
            if let Some(p) = position {
                configs.quantification.measure_on.set(p + 1, selected);
            }
            Self::apply_record(record, config, configs);
            if let Some(set) = config.quantification.as_ref().filter(|_| selected) {
                configs.quantification.measurements = set.clone();
            }
        }
        info!(channels = self.channels.len(), "Parameter log applied");
        Ok(transition)
    }

    fn apply_record(
        record: &ChannelRecord,
        config: &ResolvedChannelConfig,
        configs: &mut RoleConfigurationSet,
    ) {
        let preprocessing = match record.role {
            Role::Nuclei => configs.nuclei.as_mut().map(|c| &mut c.preprocessing),
            Role::Cell => configs
                .cell
                .as_mut()
                .map(|c| &mut c.segmentation.preprocessing),
            Role::Spot => configs
                .spot_mut(record.index)
                .map(|c| &mut c.preprocessing),
            Role::Unassigned => Some(&mut configs.quantification.preprocessing),
        };
        if let Some(pre) = preprocessing {
            pre.projection = config.projection;
            pre.use_macro = config.preprocess_macro.is_some();
            if let Some(code) = &config.preprocess_macro {
                pre.macro_code = code.clone();
            }
        }

        let measurements = config.measurements.clone();
        match (&config.detection, record.role) {
            (ChannelDetection::Segmentation(seg), Role::Nuclei) => {
                if let Some(c) = configs.nuclei.as_mut() {
                    c.set_method(seg.method.clone());
                    c.exclude_on_edges = seg.exclude_on_edges;
                    c.final_validation = seg.final_validation;
                    c.save_rois = seg.save_rois;
                    c.save_masks = seg.save_masks;
                    c.measurements = measurements;
                }
            }
            (ChannelDetection::Segmentation(seg), Role::Cell) => {
                if let Some(cell) = configs.cell.as_mut() {
                    if let Some(cytoplasm) = &seg.cytoplasm {
                        cell.cytoplasm = cytoplasm.clone();
                    }
                    let c = &mut cell.segmentation;
                    c.set_method(seg.method.clone());
                    c.exclude_on_edges = seg.exclude_on_edges;
                    c.final_validation = seg.final_validation;
                    c.save_rois = seg.save_rois;
                    c.save_masks = seg.save_masks;
                    c.measurements = measurements;
                }
            }
            (ChannelDetection::Spots(spots), Role::Spot) => {
                if let Some(c) = configs.spot_mut(record.index) {
                    c.use_find_maxima = spots.find_maxima.is_some();
                    if let Some(fm) = &spots.find_maxima {
                        c.find_maxima = fm.clone();
                    }
                    c.use_threshold = spots.threshold.is_some();
                    if let Some(t) = &spots.threshold {
                        c.threshold = t.clone();
                    }
                    c.save_rois = spots.save_rois;
                    c.save_masks = spots.save_masks;
                    c.measurements = measurements;
                }
            }
            _ => configs.quantification.measurements = measurements,
        }
    }
}

/// Text encoding of a [`ParameterDocument`].
pub trait Codec {
    fn encode(&self, doc: &ParameterDocument) -> String;

    /// Never fails: unrecognized lines are skipped.
    fn decode(&self, text: &str) -> ParameterDocument;
}

/// The line-oriented `Parameters.txt` format.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextLogCodec;

impl Codec for TextLogCodec {
    fn encode(&self, doc: &ParameterDocument) -> String {
        writer::encode(doc)
    }

    fn decode(&self, text: &str) -> ParameterDocument {
        parser::decode(text)
    }
}

/// Append-only parameter log of a working directory.
pub struct ParameterLog;

impl ParameterLog {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(PARAMETER_LOG_FILE)
    }

    /// Append `text` followed by a blank line. Returns the log path.
    pub fn append(dir: &Path, text: &str) -> Result<PathBuf> {
        let path = Self::path(dir);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.write_all(b"\n")?;
        info!(path = %path.display(), bytes = text.len(), "Parameter log appended");
        Ok(path)
    }
}
