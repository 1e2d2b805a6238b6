use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calibration::Calibration;
use crate::channel::Role;
use crate::error::{Result, SpotcellError};
use crate::settings::resolver::{ResolvedChannel, ResolvedChannelConfig, ResolvedConfigurationSet};

use super::fov::{FieldOfView, ImageRef};
use super::naming::{EndingPattern, ExperimentName};

/// One channel image with the settings to process it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelPlan {
    pub channel: usize,
    pub protein_name: String,
    pub image: ImageRef,
    pub config: ResolvedChannelConfig,
}

/// Everything needed to process the objects of one image set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Experiment {
    pub name: ExperimentName,
    /// Field of view the images come from.
    pub field: usize,
    pub calibration: Calibration,
    pub nuclei: Option<ChannelPlan>,
    pub cell: Option<ChannelPlan>,
    pub spots: Vec<ChannelPlan>,
    pub quantification: Vec<ChannelPlan>,
}

impl Experiment {
    fn new(name: ExperimentName, field: usize, calibration: &Calibration) -> Self {
        Self {
            name,
            field,
            calibration: calibration.clone(),
            nuclei: None,
            cell: None,
            spots: Vec::new(),
            quantification: Vec::new(),
        }
    }

    pub fn has_segmentation(&self) -> bool {
        self.nuclei.is_some() || self.cell.is_some()
    }

    /// All plans in execution order: nuclei, cell, spots, quantification.
    pub fn plans(&self) -> impl Iterator<Item = (Role, &ChannelPlan)> + '_ {
        self.nuclei
            .iter()
            .map(|p| (Role::Nuclei, p))
            .chain(self.cell.iter().map(|p| (Role::Cell, p)))
            .chain(self.spots.iter().map(|p| (Role::Spot, p)))
            .chain(self.quantification.iter().map(|p| (Role::Unassigned, p)))
    }

    pub fn plan_count(&self) -> usize {
        self.plans().count()
    }
}

/// Experiment a spot or quantification image joins. Without a segmentation
/// channel these images define their own experiments.
fn join<'a>(
    experiments: &'a mut BTreeMap<ExperimentName, Experiment>,
    name: ExperimentName,
    segmented: bool,
    field: usize,
    calibration: &Calibration,
) -> Option<&'a mut Experiment> {
    if segmented {
        experiments.get_mut(&name)
    } else {
        Some(
            experiments
                .entry(name.clone())
                .or_insert_with(|| Experiment::new(name, field, calibration)),
        )
    }
}

/// Builds the experiments of a field of view by joining channel images on
/// their experiment name.
pub struct ExperimentAssembler;

impl ExperimentAssembler {
    pub fn assemble(
        fov: &FieldOfView,
        resolved: &ResolvedConfigurationSet,
        pattern: &EndingPattern,
    ) -> Result<Vec<Experiment>> {
        let named = |rc: &ResolvedChannel| -> Result<(ExperimentName, ChannelPlan)> {
            let image = fov
                .image(rc.channel.index)
                .ok_or(SpotcellError::MissingImage {
                    channel: rc.channel.index,
                    field: fov.index,
                })?;
            let name = pattern
                .strip(&image.file_name)
                .ok_or_else(|| SpotcellError::EndingMismatch {
                    file: image.file_name.clone(),
                    pattern: pattern.to_string(),
                })?;
            Ok((
                name,
                ChannelPlan {
                    channel: rc.channel.index,
                    protein_name: rc.channel.protein_name.clone(),
                    image: image.clone(),
                    config: rc.config.clone(),
                },
            ))
        };

        let mut experiments: BTreeMap<ExperimentName, Experiment> = BTreeMap::new();
        let segmented = resolved.nuclei().is_some() || resolved.cell().is_some();

        if let Some(rc) = resolved.nuclei() {
            let (name, plan) = named(rc)?;
            experiments
                .entry(name.clone())
                .or_insert_with(|| Experiment::new(name, fov.index, &resolved.calibration))
                .nuclei = Some(plan);
        }
        if let Some(rc) = resolved.cell() {
            let (name, plan) = named(rc)?;
            experiments
                .entry(name.clone())
                .or_insert_with(|| Experiment::new(name, fov.index, &resolved.calibration))
                .cell = Some(plan);
        }

        for rc in resolved.spots() {
            let (name, plan) = named(rc)?;
            match join(&mut experiments, name, segmented, fov.index, &resolved.calibration) {
                Some(exp) => exp.spots.push(plan),
                None => warn!(
                    field = fov.index,
                    file = %plan.image.file_name,
                    "Spot image matches no segmented experiment"
                ),
            }
        }
        // Role channels that are also quantified get a second plan here.
        for rc in resolved.quantified() {
            let (name, mut plan) = named(rc)?;
            plan.config = plan.config.as_quantification();
            match join(&mut experiments, name, segmented, fov.index, &resolved.calibration) {
                Some(exp) => exp.quantification.push(plan),
                None => warn!(
                    field = fov.index,
                    file = %plan.image.file_name,
                    "Quantification image matches no segmented experiment"
                ),
            }
        }

        if resolved.has_spots() {
            if let Some(exp) = experiments
                .values()
                .find(|e| e.has_segmentation() && e.spots.is_empty())
            {
                return Err(SpotcellError::PairingFailure {
                    name: exp.name.to_string(),
                    field: fov.index,
                });
            }
        }

        let experiments: Vec<Experiment> = experiments.into_values().collect();
        debug!(field = fov.index, experiments = experiments.len(), "Assembled");
        Ok(experiments)
    }

    /// Assemble every used field of view in parallel, in field order.
    pub fn assemble_all(
        fields: &[FieldOfView],
        resolved: &ResolvedConfigurationSet,
        pattern: &EndingPattern,
    ) -> Result<Vec<Experiment>> {
        let per_field = fields
            .par_iter()
            .filter(|f| f.used)
            .map(|f| Self::assemble(f, resolved, pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(per_field.into_iter().flatten().collect())
    }
}
