use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::preferences::{pref_key, ConfigStore};

/// A named scalar or shape quantity computed per object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Measurement {
    Mean,
    IntegratedDensity,
    StdDev,
    Median,
    MinMax,
    Skewness,
    Area,
    Perimeter,
    Centroid,
    ShapeDescriptors,
    Feret,
    BoundingBox,
}

impl Measurement {
    pub const ALL: &[Self] = &[
        Self::Mean,
        Self::IntegratedDensity,
        Self::StdDev,
        Self::Median,
        Self::MinMax,
        Self::Skewness,
        Self::Area,
        Self::Perimeter,
        Self::Centroid,
        Self::ShapeDescriptors,
        Self::Feret,
        Self::BoundingBox,
    ];

    /// Shape quantities, only meaningful for segmented objects.
    pub fn is_morphological(self) -> bool {
        matches!(
            self,
            Self::Area
                | Self::Perimeter
                | Self::Centroid
                | Self::ShapeDescriptors
                | Self::Feret
                | Self::BoundingBox
        )
    }

    /// Token used in the parameter log.
    pub fn token(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::IntegratedDensity => "integrated_density",
            Self::StdDev => "std_dev",
            Self::Median => "median",
            Self::MinMax => "min_max",
            Self::Skewness => "skewness",
            Self::Area => "area",
            Self::Perimeter => "perimeter",
            Self::Centroid => "centroid",
            Self::ShapeDescriptors => "shape",
            Self::Feret => "feret",
            Self::BoundingBox => "bounding_box",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.token() == token)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "Mean"),
            Self::IntegratedDensity => write!(f, "Integrated Density"),
            Self::StdDev => write!(f, "Std Dev"),
            Self::Median => write!(f, "Median"),
            Self::MinMax => write!(f, "Min & Max"),
            Self::Skewness => write!(f, "Skewness"),
            Self::Area => write!(f, "Area"),
            Self::Perimeter => write!(f, "Perimeter"),
            Self::Centroid => write!(f, "Centroid"),
            Self::ShapeDescriptors => write!(f, "Shape Descriptors"),
            Self::Feret => write!(f, "Feret's Diameter"),
            Self::BoundingBox => write!(f, "Bounding Box"),
        }
    }
}

/// Independent measurement flags plus summary options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSet {
    #[serde(default)]
    pub flags: BTreeSet<Measurement>,
    /// Emit one aggregate row per field of view.
    #[serde(default)]
    pub summary: bool,
    /// Restrict the summary row to objects containing spots.
    #[serde(default)]
    pub summary_positive_only: bool,
}

impl MeasurementSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Mean, integrated density and std-dev, plus area for segmentation roles.
    pub fn standard(segmentation: bool) -> Self {
        let mut set = Self::empty()
            .with(Measurement::Mean)
            .with(Measurement::IntegratedDensity)
            .with(Measurement::StdDev);
        if segmentation {
            set.insert(Measurement::Area);
        }
        set
    }

    pub fn with(mut self, m: Measurement) -> Self {
        self.flags.insert(m);
        self
    }

    pub fn insert(&mut self, m: Measurement) {
        self.flags.insert(m);
    }

    pub fn remove(&mut self, m: Measurement) {
        self.flags.remove(&m);
    }

    pub fn contains(&self, m: Measurement) -> bool {
        self.flags.contains(&m)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn intensity(&self) -> impl Iterator<Item = Measurement> + '_ {
        self.flags.iter().copied().filter(|m| !m.is_morphological())
    }

    pub fn morphological(&self) -> impl Iterator<Item = Measurement> + '_ {
        self.flags.iter().copied().filter(|m| m.is_morphological())
    }

    /// Add the mandatory measurements: mean and integrated density always,
    /// area for segmentation roles.
    pub fn with_baseline(mut self, segmentation: bool) -> Self {
        self.insert(Measurement::Mean);
        self.insert(Measurement::IntegratedDensity);
        if segmentation {
            self.insert(Measurement::Area);
        }
        self
    }

    /// Drop the morphological flags; only segmented objects have a shape.
    pub fn without_morphological(mut self) -> Self {
        self.flags.retain(|m| !m.is_morphological());
        self
    }

    /// Space-separated tokens, `none` when empty.
    pub fn tokens<I: IntoIterator<Item = Measurement>>(measurements: I) -> String {
        let tokens: Vec<&str> = measurements.into_iter().map(Measurement::token).collect();
        if tokens.is_empty() {
            "none".to_string()
        } else {
            tokens.join(" ")
        }
    }

    /// Insert every known token of `text`; unknown tokens are skipped.
    pub fn insert_tokens(&mut self, text: &str) {
        self.flags
            .extend(text.split_whitespace().filter_map(Measurement::from_token));
    }

    pub fn load(store: &dyn ConfigStore, ns: &str, default: &Self) -> Self {
        let text = store.get_string(
            &pref_key(ns, "measurements"),
            &Self::tokens(default.flags.iter().copied()),
        );
        let mut set = Self::empty();
        set.insert_tokens(&text);
        set.summary = store.get_bool(&pref_key(ns, "summary"), default.summary);
        set.summary_positive_only = store.get_bool(
            &pref_key(ns, "summary_positive_only"),
            default.summary_positive_only,
        );
        set
    }

    pub fn store(&self, store: &mut dyn ConfigStore, ns: &str) {
        store.set(
            &pref_key(ns, "measurements"),
            Self::tokens(self.flags.iter().copied()).into(),
        );
        store.set(&pref_key(ns, "summary"), self.summary.into());
        store.set(
            &pref_key(ns, "summary_positive_only"),
            self.summary_positive_only.into(),
        );
    }
}
