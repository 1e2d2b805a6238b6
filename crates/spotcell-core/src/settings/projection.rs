use std::fmt;

use serde::{Deserialize, Serialize};

use crate::preferences::{pref_key, ConfigStore};

/// Reduction of a Z-stack to a single plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionMethod {
    #[default]
    Max,
    StdDev,
    Sum,
}

impl ProjectionMethod {
    pub const ALL: &[Self] = &[Self::Max, Self::StdDev, Self::Sum];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Max" => Some(Self::Max),
            "StdDev" => Some(Self::StdDev),
            "Sum" => Some(Self::Sum),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Max => write!(f, "Max"),
            Self::StdDev => write!(f, "StdDev"),
            Self::Sum => write!(f, "Sum"),
        }
    }
}

/// Inclusive 1-based slice range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRange {
    pub min: usize,
    pub max: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSpec {
    pub enabled: bool,
    #[serde(default)]
    pub method: ProjectionMethod,
    /// `None` projects the whole stack.
    #[serde(default)]
    pub slice_range: Option<SliceRange>,
}

impl ProjectionSpec {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(method: ProjectionMethod) -> Self {
        Self {
            enabled: true,
            method,
            slice_range: None,
        }
    }

    pub fn with_slices(mut self, min: usize, max: usize) -> Self {
        self.slice_range = Some(SliceRange { min, max });
        self
    }
}

/// Projection plus optional user macro, as edited in one panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    #[serde(default)]
    pub projection: ProjectionSpec,
    #[serde(default)]
    pub use_macro: bool,
    #[serde(default)]
    pub macro_code: String,
}

impl Preprocessing {
    /// The macro text when enabled and non-blank.
    pub fn active_macro(&self) -> Option<&str> {
        (self.use_macro && !self.macro_code.trim().is_empty()).then_some(self.macro_code.as_str())
    }

    pub fn load(store: &dyn ConfigStore, ns: &str) -> Self {
        let d = Self::default();
        let method = store.get_string(&pref_key(ns, "projection_method"), "Max");
        let mut projection = ProjectionSpec {
            enabled: store.get_bool(&pref_key(ns, "projection"), d.projection.enabled),
            method: ProjectionMethod::from_name(&method).unwrap_or_default(),
            slice_range: None,
        };
        if store.get_bool(&pref_key(ns, "slice_restricted"), false) {
            let min = store.get_int(&pref_key(ns, "slice_min"), 1).max(1) as usize;
            let max = store.get_int(&pref_key(ns, "slice_max"), min as i64).max(1) as usize;
            projection = projection.with_slices(min, max.max(min));
        }
        Self {
            projection,
            use_macro: store.get_bool(&pref_key(ns, "use_macro"), d.use_macro),
            macro_code: store.get_string(&pref_key(ns, "macro"), &d.macro_code),
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore, ns: &str) {
        store.set(&pref_key(ns, "projection"), self.projection.enabled.into());
        store.set(
            &pref_key(ns, "projection_method"),
            self.projection.method.to_string().into(),
        );
        store.set(
            &pref_key(ns, "slice_restricted"),
            self.projection.slice_range.is_some().into(),
        );
        if let Some(range) = self.projection.slice_range {
            store.set(&pref_key(ns, "slice_min"), (range.min as i64).into());
            store.set(&pref_key(ns, "slice_max"), (range.max as i64).into());
        }
        store.set(&pref_key(ns, "use_macro"), self.use_macro.into());
        store.set(&pref_key(ns, "macro"), self.macro_code.as_str().into());
    }
}
