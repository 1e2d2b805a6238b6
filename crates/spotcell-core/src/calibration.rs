use serde::{Deserialize, Serialize};

use crate::preferences::ConfigStore;

/// Spatial calibration attached to every experiment of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub name: String,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub voxel_depth: f64,
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            name: "No calibration".to_string(),
            pixel_width: 1.0,
            pixel_height: 1.0,
            voxel_depth: 1.0,
            unit: "pixel".to_string(),
        }
    }
}

impl Calibration {
    /// Human-readable line used in the parameter log.
    pub fn describe(&self) -> String {
        format!(
            "{} ({}x{}x{} {})",
            self.name, self.pixel_width, self.pixel_height, self.voxel_depth, self.unit
        )
    }

    /// Find the calibration called `name` among `available`.
    pub fn select<'a>(available: &'a [Calibration], name: &str) -> Option<&'a Calibration> {
        available.iter().find(|c| c.name == name)
    }

    pub fn load(store: &dyn ConfigStore) -> Self {
        let d = Self::default();
        Self {
            name: store.get_string("calibration.name", &d.name),
            pixel_width: store.get_double("calibration.pixel_width", d.pixel_width),
            pixel_height: store.get_double("calibration.pixel_height", d.pixel_height),
            voxel_depth: store.get_double("calibration.voxel_depth", d.voxel_depth),
            unit: store.get_string("calibration.unit", &d.unit),
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore) {
        store.set("calibration.name", self.name.as_str().into());
        store.set("calibration.pixel_width", self.pixel_width.into());
        store.set("calibration.pixel_height", self.pixel_height.into());
        store.set("calibration.voxel_depth", self.voxel_depth.into());
        store.set("calibration.unit", self.unit.as_str().into());
    }
}
