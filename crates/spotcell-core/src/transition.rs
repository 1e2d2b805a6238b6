//! Keeps the panel set in step with the channel roles.
//!
//! [`RoleTransitionController::normalize`] is the only place that creates or
//! drops role panels and the only writer of the cell panel variant. Dropped
//! panels are written to the preference store first, so re-assigning a role
//! brings the last values back.

use std::fmt;

use tracing::{debug, info};

use crate::channel::{ChannelRegistry, Role};
use crate::preferences::ConfigStore;
use crate::settings::roles::{
    CellConfig, CellVariant, RoleConfigurationSet, SegmentationConfig, SpotConfig,
};

/// A configuration panel, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PanelId {
    Nuclei,
    Cell,
    Quantification,
    Spot(usize),
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nuclei => write!(f, "Nuclei"),
            Self::Cell => write!(f, "Cell"),
            Self::Quantification => write!(f, "Quantification"),
            Self::Spot(channel) => write!(f, "Spot C{channel}"),
        }
    }
}

/// Result of one normalization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    /// Nuclei?, Cell?, Quantification, then spots by channel index.
    pub panels: Vec<PanelId>,
    /// Newly created panel that should receive focus.
    pub auto_select: Option<PanelId>,
    /// Channels whose exclusive role was dropped as a duplicate.
    pub demoted: Vec<usize>,
}

pub struct RoleTransitionController;

impl RoleTransitionController {
    pub fn normalize(
        registry: &mut ChannelRegistry,
        configs: &mut RoleConfigurationSet,
        store: &mut dyn ConfigStore,
    ) -> Transition {
        let demoted = Self::demote_duplicates(registry);

        let mut new_nuclei = false;
        match registry.nuclei_channel().map(|c| c.index) {
            Some(channel) => match configs.nuclei.as_mut() {
                Some(cfg) => cfg.channel = channel,
                None => {
                    configs.nuclei = Some(SegmentationConfig::load(&*store, Role::Nuclei, channel));
                    new_nuclei = true;
                    debug!(channel, "Nuclei panel created");
                }
            },
            None => {
                if let Some(old) = configs.nuclei.take() {
                    old.store(store, Role::Nuclei);
                    debug!(channel = old.channel, "Nuclei panel removed");
                }
            }
        }

        let mut new_cell = false;
        match registry.cell_channel().map(|c| c.index) {
            Some(channel) => match configs.cell.as_mut() {
                Some(cfg) => cfg.segmentation.channel = channel,
                None => {
                    configs.cell = Some(CellConfig::load(&*store, channel));
                    new_cell = true;
                    debug!(channel, "Cell panel created");
                }
            },
            None => {
                if let Some(old) = configs.cell.take() {
                    old.store(store);
                    debug!(channel = old.segmentation.channel, "Cell panel removed");
                }
            }
        }
        let paired = configs.nuclei.is_some();
        if let Some(cell) = configs.cell.as_mut() {
            cell.set_variant(if paired {
                CellVariant::WithCytoplasm
            } else {
                CellVariant::CellOnly
            });
        }

        let spot_channels: Vec<(usize, String)> = registry
            .spot_channels()
            .map(|c| (c.index, c.protein_name.clone()))
            .collect();
        let (kept, dropped): (Vec<SpotConfig>, Vec<SpotConfig>) = std::mem::take(&mut configs.spots)
            .into_iter()
            .partition(|s| spot_channels.iter().any(|(i, _)| *i == s.channel));
        configs.spots = kept;
        for old in dropped {
            old.store(store);
            debug!(channel = old.channel, "Spot panel removed");
        }
        let mut new_spot = None;
        for (channel, protein) in &spot_channels {
            match configs.spot_mut(*channel) {
                Some(cfg) => {
                    if cfg.protein_name != *protein {
                        debug!(channel, from = %cfg.protein_name, to = %protein, "Spot panel renamed");
                        cfg.protein_name = protein.clone();
                    }
                }
                None => {
                    configs.insert_spot(SpotConfig::load(&*store, *channel, protein));
                    new_spot = Some(PanelId::Spot(*channel));
                    debug!(channel, "Spot panel created");
                }
            }
        }

        configs.quantification.relabel(registry);

        let mut panels = Vec::with_capacity(3 + configs.spots.len());
        if configs.nuclei.is_some() {
            panels.push(PanelId::Nuclei);
        }
        if configs.cell.is_some() {
            panels.push(PanelId::Cell);
        }
        panels.push(PanelId::Quantification);
        panels.extend(configs.spots.iter().map(|s| PanelId::Spot(s.channel)));

        let auto_select = if new_nuclei {
            Some(PanelId::Nuclei)
        } else if new_cell {
            Some(PanelId::Cell)
        } else {
            new_spot
        };

        info!(
            panels = panels.len(),
            spots = configs.spots.len(),
            demoted = demoted.len(),
            "Roles normalized"
        );
        Transition {
            panels,
            auto_select,
            demoted,
        }
    }

    /// Keep the first holder of each exclusive role in index order.
    fn demote_duplicates(registry: &mut ChannelRegistry) -> Vec<usize> {
        let mut seen_nuclei = false;
        let mut seen_cell = false;
        let mut demoted = Vec::new();
        for c in registry.channels_mut() {
            let seen = match c.role {
                Role::Nuclei => &mut seen_nuclei,
                Role::Cell => &mut seen_cell,
                _ => continue,
            };
            if *seen {
                info!(channel = c.index, role = %c.role, "Duplicate exclusive role demoted");
                c.role = Role::Unassigned;
                demoted.push(c.index);
            } else {
                *seen = true;
            }
        }
        demoted
    }
}
