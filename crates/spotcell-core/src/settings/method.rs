use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CELLPOSE_CELL_MODEL, DEFAULT_CELLPOSE_DIAMETER, DEFAULT_CELLPOSE_NUCLEI_MODEL,
    DEFAULT_MAXIMA_PROMINENCE, DEFAULT_MIN_CYTOPLASM_PERCENT, DEFAULT_MIN_OBJECT_SIZE, DEFAULT_MIN_SPOT_SIZE,
    DEFAULT_STARDIST_MODEL, DEFAULT_STARDIST_NMS_THRESHOLD, DEFAULT_STARDIST_PERCENTILE_HIGH,
    DEFAULT_STARDIST_PERCENTILE_LOW, DEFAULT_STARDIST_PROB_THRESHOLD,
};
use crate::error::{Result, SpotcellError};

/// Automatic global threshold algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMethod {
    #[default]
    Default,
    Huang,
    Li,
    MaxEntropy,
    Mean,
    Minimum,
    Moments,
    Otsu,
    Triangle,
    Yen,
}

impl ThresholdMethod {
    pub const ALL: &[Self] = &[
        Self::Default,
        Self::Huang,
        Self::Li,
        Self::MaxEntropy,
        Self::Mean,
        Self::Minimum,
        Self::Moments,
        Self::Otsu,
        Self::Triangle,
        Self::Yen,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.iter().copied().find(|m| m.to_string() == name)
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Huang => write!(f, "Huang"),
            Self::Li => write!(f, "Li"),
            Self::MaxEntropy => write!(f, "MaxEntropy"),
            Self::Mean => write!(f, "Mean"),
            Self::Minimum => write!(f, "Minimum"),
            Self::Moments => write!(f, "Moments"),
            Self::Otsu => write!(f, "Otsu"),
            Self::Triangle => write!(f, "Triangle"),
            Self::Yen => write!(f, "Yen"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub method: ThresholdMethod,
    /// Minimum object size in pixels.
    pub min_size: f64,
    pub watershed: bool,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::default(),
            min_size: DEFAULT_MIN_OBJECT_SIZE,
            watershed: false,
        }
    }
}

impl ThresholdParams {
    pub fn for_spots() -> Self {
        Self {
            min_size: DEFAULT_MIN_SPOT_SIZE,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellposeParams {
    pub model: String,
    /// Expected object diameter in pixels (0 lets Cellpose estimate it).
    pub diameter: f64,
    pub prob_threshold: f64,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl CellposeParams {
    pub fn nuclei() -> Self {
        Self {
            model: DEFAULT_CELLPOSE_NUCLEI_MODEL.to_string(),
            diameter: DEFAULT_CELLPOSE_DIAMETER,
            prob_threshold: 0.0,
            model_path: None,
        }
    }

    pub fn cell() -> Self {
        Self {
            model: DEFAULT_CELLPOSE_CELL_MODEL.to_string(),
            ..Self::nuclei()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarDistParams {
    pub model: String,
    pub percentile_low: f64,
    pub percentile_high: f64,
    pub prob_threshold: f64,
    pub nms_threshold: f64,
    pub scale: f64,
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

impl Default for StarDistParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_STARDIST_MODEL.to_string(),
            percentile_low: DEFAULT_STARDIST_PERCENTILE_LOW,
            percentile_high: DEFAULT_STARDIST_PERCENTILE_HIGH,
            prob_threshold: DEFAULT_STARDIST_PROB_THRESHOLD,
            nms_threshold: DEFAULT_STARDIST_NMS_THRESHOLD,
            scale: 1.0,
            model_path: None,
        }
    }
}

/// User macro producing the segmentation itself.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroSegmentation {
    pub code: String,
    /// The macro leaves its objects in the ROI manager.
    pub result_in_manager: bool,
    /// The macro output image is a label (instance) mask.
    pub result_is_instance_mask: bool,
}

/// Segmentation method selector (no associated data, just the discriminant).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationChoice {
    #[default]
    Threshold,
    Cellpose,
    StarDist,
    Macro,
}

impl SegmentationChoice {
    pub const ALL: &[Self] = &[Self::Threshold, Self::Cellpose, Self::StarDist, Self::Macro];
}

impl fmt::Display for SegmentationChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold => write!(f, "Thresholding"),
            Self::Cellpose => write!(f, "Cellpose"),
            Self::StarDist => write!(f, "StarDist"),
            Self::Macro => write!(f, "Macro"),
        }
    }
}

/// Exactly one active segmentation method with its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SegmentationMethod {
    Threshold(ThresholdParams),
    Cellpose(CellposeParams),
    StarDist(StarDistParams),
    Macro(MacroSegmentation),
}

impl SegmentationMethod {
    pub fn choice(&self) -> SegmentationChoice {
        match self {
            Self::Threshold(_) => SegmentationChoice::Threshold,
            Self::Cellpose(_) => SegmentationChoice::Cellpose,
            Self::StarDist(_) => SegmentationChoice::StarDist,
            Self::Macro(_) => SegmentationChoice::Macro,
        }
    }

    /// Reject parameter sets no detector could run with.
    pub fn validate(&self, panel: &str) -> Result<()> {
        let missing = |what: &str| -> Result<()> {
            Err(SpotcellError::ConfigurationIncomplete(format!(
                "{panel}: {what}"
            )))
        };
        match self {
            Self::Threshold(p) if p.min_size < 0.0 => missing("minimum size must not be negative"),
            Self::Cellpose(p) if p.model.trim().is_empty() && p.model_path.is_none() => {
                missing("no Cellpose model chosen")
            }
            Self::StarDist(p) if p.model.trim().is_empty() && p.model_path.is_none() => {
                missing("no StarDist model chosen")
            }
            Self::StarDist(p) if p.percentile_low >= p.percentile_high => {
                missing("StarDist low percentile must be below the high percentile")
            }
            Self::Macro(m) if m.code.trim().is_empty() => missing("segmentation macro is empty"),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold(p) => write!(f, "Thresholding ({}, min size {})", p.method, p.min_size),
            Self::Cellpose(p) => write!(f, "Cellpose ({}, diameter {})", p.model, p.diameter),
            Self::StarDist(p) => write!(f, "StarDist ({})", p.model),
            Self::Macro(_) => write!(f, "Macro"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FindMaximaParams {
    pub prominence: f64,
}

impl Default for FindMaximaParams {
    fn default() -> Self {
        Self {
            prominence: DEFAULT_MAXIMA_PROMINENCE,
        }
    }
}

/// Cytoplasm extraction for a cell segmentation paired with nuclei.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CytoplasmOptions {
    pub extract: bool,
    /// Cells whose cytoplasm is smaller than this share of the cell area are dropped.
    pub min_size_percent: f64,
}

impl Default for CytoplasmOptions {
    fn default() -> Self {
        Self {
            extract: true,
            min_size_percent: DEFAULT_MIN_CYTOPLASM_PERCENT,
        }
    }
}
