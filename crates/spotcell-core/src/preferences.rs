//! Persisted defaults for channel and panel settings.
//!
//! Components never reach for ambient state: everything that reads or writes
//! a remembered value takes a [`ConfigStore`]. Keys are namespaced by role
//! (`nuclei.*`, `cell.*`, `quantification.*`) and, for spot channels, by the
//! channel index (`spot2.*`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// A single stored preference value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl From<bool> for PrefValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PrefValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PrefValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for PrefValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Key/value preference store with an explicit flush point.
///
/// Typed getters fall back to `default` when the key is missing or holds a
/// value of another type.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<PrefValue>;

    fn set(&mut self, key: &str, value: PrefValue);

    /// Flush pending values to the backing medium.
    fn save(&mut self) -> Result<()>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(PrefValue::Bool(v)) => v,
            _ => default,
        }
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(PrefValue::Int(v)) => v,
            _ => default,
        }
    }

    fn get_double(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(PrefValue::Double(v)) => v,
            Some(PrefValue::Int(v)) => v as f64,
            _ => default,
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(PrefValue::Text(v)) => v,
            _ => default.to_string(),
        }
    }
}

/// Build a namespaced preference key, e.g. `pref_key("spot2", "use_macro")`.
pub fn pref_key(namespace: &str, field: &str) -> String {
    format!("{namespace}.{field}")
}

/// In-memory store. `save` is a no-op.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, PrefValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigStore for MemoryStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Store backed by a flat TOML table on disk. Values are written on `save`.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
    dirty: bool,
}

impl TomlFileStore {
    /// Open the store at `path`. A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let values = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = values.len(), "Opened preference store");
        Ok(Self {
            path: path.to_path_buf(),
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether values were set since the last `save`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl ConfigStore for TomlFileStore {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        self.values.insert(key.to_string(), value);
        self.dirty = true;
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = toml::to_string(&self.values)?;
        std::fs::write(&self.path, contents)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.values.len(), "Saved preference store");
        Ok(())
    }
}
