use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spotcell_core::calibration::Calibration;
use spotcell_core::channel::{Channel, ChannelRegistry, Role};
use spotcell_core::consts::DEFAULT_LOG_HEADER;
use spotcell_core::experiment::EndingPattern;
use spotcell_core::preferences::{ConfigStore, MemoryStore, TomlFileStore};
use spotcell_core::settings::{
    ProjectionMethod, ProjectionSpec, ResolvedConfigurationSet, RoleConfigurationSet,
    SettingsResolver,
};
use spotcell_core::transition::{RoleTransitionController, Transition};

fn default_header() -> String {
    DEFAULT_LOG_HEADER.to_string()
}

/// Everything needed to plan a run, stored as TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default)]
    pub calibration: Calibration,
    #[serde(default)]
    pub ending_pattern: EndingPattern,
    /// Preference file seeding panels created during normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<PathBuf>,
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub configs: RoleConfigurationSet,
}

impl Session {
    /// Nuclei on C1, spots on C2, C3 quantified only.
    pub fn example() -> Self {
        let mut channels: Vec<Channel> = (1..=3).map(Channel::new).collect();
        channels[0].role = Role::Nuclei;
        channels[0].protein_name = "DAPI".to_string();
        channels[1].role = Role::Spot;
        channels[1].protein_name = "GFP".to_string();
        channels[2].quantify = true;
        channels[2].protein_name = "mCherry".to_string();
        let mut session = Self {
            header: default_header(),
            calibration: Calibration::default(),
            ending_pattern: EndingPattern::default(),
            preferences: None,
            channels,
            configs: RoleConfigurationSet::default(),
        };
        let mut store = MemoryStore::new();
        session.normalize(&mut store);
        session.configs.quantification.preprocessing.projection =
            ProjectionSpec::enabled(ProjectionMethod::Max);
        session
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse session {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write session to {}", path.display()))
    }

    pub fn registry(&self) -> ChannelRegistry {
        ChannelRegistry::from_channels(self.channels.clone())
    }

    /// Bring panels in line with the channel roles.
    pub fn normalize(&mut self, store: &mut dyn ConfigStore) -> Transition {
        let mut registry = self.registry();
        let transition = RoleTransitionController::normalize(&mut registry, &mut self.configs, store);
        self.channels = registry.channels().to_vec();
        transition
    }

    /// Normalize against the session's preference file (if any) and resolve.
    pub fn resolve(&mut self) -> Result<(ChannelRegistry, ResolvedConfigurationSet)> {
        match &self.preferences {
            Some(path) => {
                let mut store = TomlFileStore::open(path)
                    .with_context(|| format!("Failed to open preferences {}", path.display()))?;
                self.normalize(&mut store);
                self.configs.store(&mut store);
                self.registry().store(&mut store);
                store.save()?;
            }
            None => {
                self.normalize(&mut MemoryStore::new());
            }
        }
        let registry = self.registry();
        let resolved = SettingsResolver::new(&registry, &self.configs)
            .resolve(&self.calibration)
            .context("Session configuration is incomplete")?;
        Ok((registry, resolved))
    }
}
