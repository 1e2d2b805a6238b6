use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelRegistry, Role};
use crate::preferences::{pref_key, ConfigStore};
use crate::selection::SelectionSet;

use super::measurements::MeasurementSet;
use super::method::{
    CellposeParams, CytoplasmOptions, FindMaximaParams, MacroSegmentation, SegmentationChoice,
    SegmentationMethod, StarDistParams, ThresholdMethod, ThresholdParams,
};
use super::projection::Preprocessing;

/// Editable settings of a Nuclei or Cell segmentation panel.
///
/// Holds the parameters of every method so switching the method back and
/// forth keeps what the user typed; [`method`](Self::method) builds the
/// active one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub channel: usize,
    #[serde(default)]
    pub preprocessing: Preprocessing,
    #[serde(default)]
    pub method: SegmentationChoice,
    #[serde(default)]
    pub threshold: ThresholdParams,
    #[serde(default = "CellposeParams::nuclei")]
    pub cellpose: CellposeParams,
    #[serde(default)]
    pub stardist: StarDistParams,
    #[serde(default)]
    pub macro_segmentation: MacroSegmentation,
    #[serde(default)]
    pub exclude_on_edges: bool,
    #[serde(default)]
    pub final_validation: bool,
    #[serde(default)]
    pub save_rois: bool,
    #[serde(default)]
    pub save_masks: bool,
    #[serde(default)]
    pub measurements: MeasurementSet,
}

impl SegmentationConfig {
    pub fn new(role: Role, channel: usize) -> Self {
        Self {
            channel,
            preprocessing: Preprocessing::default(),
            method: SegmentationChoice::default(),
            threshold: ThresholdParams::default(),
            cellpose: if role == Role::Cell {
                CellposeParams::cell()
            } else {
                CellposeParams::nuclei()
            },
            stardist: StarDistParams::default(),
            macro_segmentation: MacroSegmentation::default(),
            exclude_on_edges: true,
            final_validation: false,
            save_rois: true,
            save_masks: false,
            measurements: MeasurementSet::standard(true),
        }
    }

    pub fn method(&self) -> SegmentationMethod {
        match self.method {
            SegmentationChoice::Threshold => SegmentationMethod::Threshold(self.threshold.clone()),
            SegmentationChoice::Cellpose => SegmentationMethod::Cellpose(self.cellpose.clone()),
            SegmentationChoice::StarDist => SegmentationMethod::StarDist(self.stardist.clone()),
            SegmentationChoice::Macro => {
                SegmentationMethod::Macro(self.macro_segmentation.clone())
            }
        }
    }

    pub fn set_method(&mut self, method: SegmentationMethod) {
        self.method = method.choice();
        match method {
            SegmentationMethod::Threshold(p) => self.threshold = p,
            SegmentationMethod::Cellpose(p) => self.cellpose = p,
            SegmentationMethod::StarDist(p) => self.stardist = p,
            SegmentationMethod::Macro(m) => self.macro_segmentation = m,
        }
    }

    /// Remembered settings for `role`, defaults where nothing was stored.
    pub fn load(store: &dyn ConfigStore, role: Role, channel: usize) -> Self {
        let ns = role.namespace(channel);
        let d = Self::new(role, channel);
        let key = |field: &str| pref_key(&ns, field);
        let choice = store.get_string(&key("method"), &d.method.to_string());
        Self {
            channel,
            preprocessing: Preprocessing::load(store, &ns),
            method: SegmentationChoice::ALL
                .iter()
                .copied()
                .find(|c| c.to_string() == choice)
                .unwrap_or(d.method),
            threshold: load_threshold(store, &ns, &d.threshold),
            cellpose: CellposeParams {
                model: store.get_string(&key("cellpose_model"), &d.cellpose.model),
                diameter: store.get_double(&key("cellpose_diameter"), d.cellpose.diameter),
                prob_threshold: store
                    .get_double(&key("cellpose_prob_threshold"), d.cellpose.prob_threshold),
                model_path: optional_path(store.get_string(&key("cellpose_model_path"), "")),
            },
            stardist: StarDistParams {
                model: store.get_string(&key("stardist_model"), &d.stardist.model),
                percentile_low: store
                    .get_double(&key("stardist_percentile_low"), d.stardist.percentile_low),
                percentile_high: store
                    .get_double(&key("stardist_percentile_high"), d.stardist.percentile_high),
                prob_threshold: store
                    .get_double(&key("stardist_prob_threshold"), d.stardist.prob_threshold),
                nms_threshold: store
                    .get_double(&key("stardist_nms_threshold"), d.stardist.nms_threshold),
                scale: store.get_double(&key("stardist_scale"), d.stardist.scale),
                model_path: optional_path(store.get_string(&key("stardist_model_path"), "")),
            },
            macro_segmentation: MacroSegmentation {
                code: store.get_string(&key("segmentation_macro"), ""),
                result_in_manager: store.get_bool(&key("macro_result_in_manager"), false),
                result_is_instance_mask: store.get_bool(&key("macro_instance_mask"), false),
            },
            exclude_on_edges: store.get_bool(&key("exclude_on_edges"), d.exclude_on_edges),
            final_validation: store.get_bool(&key("final_validation"), d.final_validation),
            save_rois: store.get_bool(&key("save_rois"), d.save_rois),
            save_masks: store.get_bool(&key("save_masks"), d.save_masks),
            measurements: MeasurementSet::load(store, &ns, &d.measurements),
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore, role: Role) {
        let ns = role.namespace(self.channel);
        let key = |field: &str| pref_key(&ns, field);
        self.preprocessing.store(store, &ns);
        store.set(&key("method"), self.method.to_string().into());
        store_threshold(store, &ns, &self.threshold);
        store.set(&key("cellpose_model"), self.cellpose.model.as_str().into());
        store.set(&key("cellpose_diameter"), self.cellpose.diameter.into());
        store.set(&key("cellpose_prob_threshold"), self.cellpose.prob_threshold.into());
        store.set(&key("cellpose_model_path"), path_text(&self.cellpose.model_path).into());
        store.set(&key("stardist_model"), self.stardist.model.as_str().into());
        store.set(&key("stardist_percentile_low"), self.stardist.percentile_low.into());
        store.set(&key("stardist_percentile_high"), self.stardist.percentile_high.into());
        store.set(&key("stardist_prob_threshold"), self.stardist.prob_threshold.into());
        store.set(&key("stardist_nms_threshold"), self.stardist.nms_threshold.into());
        store.set(&key("stardist_scale"), self.stardist.scale.into());
        store.set(&key("stardist_model_path"), path_text(&self.stardist.model_path).into());
        store.set(
            &key("segmentation_macro"),
            self.macro_segmentation.code.as_str().into(),
        );
        store.set(
            &key("macro_result_in_manager"),
            self.macro_segmentation.result_in_manager.into(),
        );
        store.set(
            &key("macro_instance_mask"),
            self.macro_segmentation.result_is_instance_mask.into(),
        );
        store.set(&key("exclude_on_edges"), self.exclude_on_edges.into());
        store.set(&key("final_validation"), self.final_validation.into());
        store.set(&key("save_rois"), self.save_rois.into());
        store.set(&key("save_masks"), self.save_masks.into());
        self.measurements.store(store, &ns);
    }
}

/// Whether the cell panel also extracts cytoplasm from a nuclei partner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellVariant {
    #[default]
    CellOnly,
    WithCytoplasm,
}

/// Cell segmentation panel. The variant is decided by the role transition
/// controller and only read here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    variant: CellVariant,
    #[serde(default)]
    pub cytoplasm: CytoplasmOptions,
}

impl CellConfig {
    pub fn new(channel: usize) -> Self {
        Self {
            segmentation: SegmentationConfig::new(Role::Cell, channel),
            variant: CellVariant::CellOnly,
            cytoplasm: CytoplasmOptions::default(),
        }
    }

    pub fn variant(&self) -> CellVariant {
        self.variant
    }

    pub(crate) fn set_variant(&mut self, variant: CellVariant) {
        self.variant = variant;
    }

    /// Cytoplasm options, only while paired with a nuclei panel.
    pub fn active_cytoplasm(&self) -> Option<&CytoplasmOptions> {
        match self.variant {
            CellVariant::WithCytoplasm => Some(&self.cytoplasm),
            CellVariant::CellOnly => None,
        }
    }

    pub fn load(store: &dyn ConfigStore, channel: usize) -> Self {
        let d = CytoplasmOptions::default();
        Self {
            segmentation: SegmentationConfig::load(store, Role::Cell, channel),
            variant: CellVariant::CellOnly,
            cytoplasm: CytoplasmOptions {
                extract: store.get_bool("cell.cytoplasm", d.extract),
                min_size_percent: store
                    .get_double("cell.min_cytoplasm_percent", d.min_size_percent),
            },
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore) {
        self.segmentation.store(store, Role::Cell);
        store.set("cell.cytoplasm", self.cytoplasm.extract.into());
        store.set("cell.min_cytoplasm_percent", self.cytoplasm.min_size_percent.into());
    }
}

/// Spot detection panel of one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotConfig {
    pub channel: usize,
    pub protein_name: String,
    #[serde(default)]
    pub preprocessing: Preprocessing,
    #[serde(default)]
    pub use_find_maxima: bool,
    #[serde(default)]
    pub find_maxima: FindMaximaParams,
    #[serde(default)]
    pub use_threshold: bool,
    #[serde(default = "ThresholdParams::for_spots")]
    pub threshold: ThresholdParams,
    #[serde(default)]
    pub save_rois: bool,
    #[serde(default)]
    pub save_masks: bool,
    #[serde(default)]
    pub measurements: MeasurementSet,
}

impl SpotConfig {
    pub fn new(channel: usize, protein_name: impl Into<String>) -> Self {
        Self {
            channel,
            protein_name: protein_name.into(),
            preprocessing: Preprocessing::default(),
            use_find_maxima: true,
            find_maxima: FindMaximaParams::default(),
            use_threshold: false,
            threshold: ThresholdParams::for_spots(),
            save_rois: false,
            save_masks: false,
            measurements: MeasurementSet::standard(false),
        }
    }

    pub fn active_find_maxima(&self) -> Option<&FindMaximaParams> {
        self.use_find_maxima.then_some(&self.find_maxima)
    }

    pub fn active_threshold(&self) -> Option<&ThresholdParams> {
        self.use_threshold.then_some(&self.threshold)
    }

    pub fn load(store: &dyn ConfigStore, channel: usize, protein_name: &str) -> Self {
        let ns = Role::Spot.namespace(channel);
        let d = Self::new(channel, protein_name);
        let key = |field: &str| pref_key(&ns, field);
        Self {
            channel,
            protein_name: protein_name.to_string(),
            preprocessing: Preprocessing::load(store, &ns),
            use_find_maxima: store.get_bool(&key("use_find_maxima"), d.use_find_maxima),
            find_maxima: FindMaximaParams {
                prominence: store.get_double(&key("prominence"), d.find_maxima.prominence),
            },
            use_threshold: store.get_bool(&key("use_threshold"), d.use_threshold),
            threshold: load_threshold(store, &ns, &d.threshold),
            save_rois: store.get_bool(&key("save_rois"), d.save_rois),
            save_masks: store.get_bool(&key("save_masks"), d.save_masks),
            measurements: MeasurementSet::load(store, &ns, &d.measurements),
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore) {
        let ns = Role::Spot.namespace(self.channel);
        let key = |field: &str| pref_key(&ns, field);
        self.preprocessing.store(store, &ns);
        store.set(&key("use_find_maxima"), self.use_find_maxima.into());
        store.set(&key("prominence"), self.find_maxima.prominence.into());
        store.set(&key("use_threshold"), self.use_threshold.into());
        store_threshold(store, &ns, &self.threshold);
        store.set(&key("save_rois"), self.save_rois.into());
        store.set(&key("save_masks"), self.save_masks.into());
        self.measurements.store(store, &ns);
    }
}

/// Always-present panel covering every channel; also the source of fallback
/// preprocessing for role panels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantificationConfig {
    #[serde(default)]
    pub preprocessing: Preprocessing,
    #[serde(default)]
    pub measurements: MeasurementSet,
    /// Channels receiving their panel's measurement set.
    #[serde(default)]
    pub measure_on: SelectionSet,
    /// Channels allowed to inherit this panel's preprocessing.
    #[serde(default)]
    pub preprocess_on: SelectionSet,
    /// Display label per channel, in registry order.
    #[serde(default)]
    pub channel_labels: Vec<String>,
}

impl Default for QuantificationConfig {
    fn default() -> Self {
        Self {
            preprocessing: Preprocessing::default(),
            measurements: MeasurementSet::standard(false),
            measure_on: SelectionSet::default(),
            preprocess_on: SelectionSet::default(),
            channel_labels: Vec::new(),
        }
    }
}

impl QuantificationConfig {
    /// Rebuild labels and resize selections for the current channel set.
    pub fn relabel(&mut self, registry: &ChannelRegistry) {
        self.channel_labels = registry
            .channels()
            .iter()
            .map(|c| format!("C{} ({})", c.index, c.protein_name))
            .collect();
        self.measure_on.resize(registry.len());
        self.preprocess_on.resize(registry.len());
    }

    pub fn load(store: &dyn ConfigStore) -> Self {
        let ns = Role::Unassigned.namespace(0);
        let d = Self::default();
        Self {
            preprocessing: Preprocessing::load(store, &ns),
            measurements: MeasurementSet::load(store, &ns, &d.measurements),
            ..d
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore) {
        let ns = Role::Unassigned.namespace(0);
        self.preprocessing.store(store, &ns);
        self.measurements.store(store, &ns);
    }
}

/// Borrowed view of the panel that owns a channel's settings.
#[derive(Clone, Copy, Debug)]
pub enum PanelConfig<'a> {
    Nuclei(&'a SegmentationConfig),
    Cell(&'a CellConfig),
    Spot(&'a SpotConfig),
    Quantification(&'a QuantificationConfig),
}

impl<'a> PanelConfig<'a> {
    pub fn preprocessing(&self) -> &'a Preprocessing {
        match *self {
            Self::Nuclei(c) => &c.preprocessing,
            Self::Cell(c) => &c.segmentation.preprocessing,
            Self::Spot(c) => &c.preprocessing,
            Self::Quantification(c) => &c.preprocessing,
        }
    }

    pub fn measurements(&self) -> &'a MeasurementSet {
        match *self {
            Self::Nuclei(c) => &c.measurements,
            Self::Cell(c) => &c.segmentation.measurements,
            Self::Spot(c) => &c.measurements,
            Self::Quantification(c) => &c.measurements,
        }
    }
}

/// All editable panels of a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleConfigurationSet {
    #[serde(default)]
    pub nuclei: Option<SegmentationConfig>,
    #[serde(default)]
    pub cell: Option<CellConfig>,
    /// One panel per spot channel, ordered by channel index.
    #[serde(default)]
    pub spots: Vec<SpotConfig>,
    #[serde(default)]
    pub quantification: QuantificationConfig,
}

impl RoleConfigurationSet {
    pub fn spot(&self, channel: usize) -> Option<&SpotConfig> {
        self.spots.iter().find(|s| s.channel == channel)
    }

    pub fn spot_mut(&mut self, channel: usize) -> Option<&mut SpotConfig> {
        self.spots.iter_mut().find(|s| s.channel == channel)
    }

    pub(crate) fn insert_spot(&mut self, config: SpotConfig) {
        let pos = self
            .spots
            .binary_search_by_key(&config.channel, |s| s.channel)
            .unwrap_or_else(|p| p);
        self.spots.insert(pos, config);
    }

    /// The panel whose settings apply to `channel`.
    pub fn panel_for(&self, channel: &Channel) -> PanelConfig<'_> {
        let by_role = match channel.role {
            Role::Nuclei => self.nuclei.as_ref().map(PanelConfig::Nuclei),
            Role::Cell => self.cell.as_ref().map(PanelConfig::Cell),
            Role::Spot => self.spot(channel.index).map(PanelConfig::Spot),
            Role::Unassigned => None,
        };
        by_role.unwrap_or(PanelConfig::Quantification(&self.quantification))
    }

    /// Persist every present panel.
    pub fn store(&self, store: &mut dyn ConfigStore) {
        if let Some(nuclei) = &self.nuclei {
            nuclei.store(store, Role::Nuclei);
        }
        if let Some(cell) = &self.cell {
            cell.store(store);
        }
        for spot in &self.spots {
            spot.store(store);
        }
        self.quantification.store(store);
    }
}

fn load_threshold(store: &dyn ConfigStore, ns: &str, d: &ThresholdParams) -> ThresholdParams {
    let method = store.get_string(&pref_key(ns, "threshold_method"), &d.method.to_string());
    ThresholdParams {
        method: ThresholdMethod::from_name(&method).unwrap_or(d.method),
        min_size: store.get_double(&pref_key(ns, "min_size"), d.min_size),
        watershed: store.get_bool(&pref_key(ns, "watershed"), d.watershed),
    }
}

fn store_threshold(store: &mut dyn ConfigStore, ns: &str, p: &ThresholdParams) {
    store.set(&pref_key(ns, "threshold_method"), p.method.to_string().into());
    store.set(&pref_key(ns, "min_size"), p.min_size.into());
    store.set(&pref_key(ns, "watershed"), p.watershed.into());
}

fn optional_path(text: String) -> Option<std::path::PathBuf> {
    (!text.trim().is_empty()).then(|| text.into())
}

fn path_text(path: &Option<std::path::PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
