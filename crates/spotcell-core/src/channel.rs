use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SpotcellError};
use crate::experiment::naming::EndingPattern;
use crate::preferences::{pref_key, ConfigStore};

/// Processing purpose assigned to a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Unassigned,
    Nuclei,
    Cell,
    Spot,
}

impl Role {
    /// Nuclei and Cell may be held by one channel at a time.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Nuclei | Self::Cell)
    }

    pub fn is_segmentation(self) -> bool {
        self.is_exclusive()
    }

    /// Preference namespace of the role. Spots are namespaced per channel.
    pub fn namespace(self, channel: usize) -> String {
        match self {
            Self::Unassigned => "quantification".to_string(),
            Self::Nuclei => "nuclei".to_string(),
            Self::Cell => "cell".to_string(),
            Self::Spot => format!("spot{channel}"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "None"),
            Self::Nuclei => write!(f, "Nuclei"),
            Self::Cell => write!(f, "Cell"),
            Self::Spot => write!(f, "Spot"),
        }
    }
}

impl FromStr for Role {
    type Err = SpotcellError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::Unassigned),
            "nuclei" => Ok(Self::Nuclei),
            "cell" | "cells" => Ok(Self::Cell),
            "spot" | "spots" => Ok(Self::Spot),
            other => Err(SpotcellError::ConfigurationIncomplete(format!(
                "unknown role `{other}`"
            ))),
        }
    }
}

/// One imaging channel of a field of view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// 1-based channel number, as it appears in file names and the log.
    pub index: usize,
    #[serde(default = "default_true")]
    pub used: bool,
    #[serde(default)]
    pub role: Role,
    /// Pixel values of this channel are measured (independent of `role`).
    #[serde(default)]
    pub quantify: bool,
    pub protein_name: String,
    /// File-name ending identifying this channel's images.
    pub ending: EndingPattern,
}

fn default_true() -> bool {
    true
}

impl Channel {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            used: true,
            role: Role::Unassigned,
            quantify: false,
            protein_name: format!("C{index}"),
            ending: EndingPattern::new(format!("_w{index}")),
        }
    }

    /// No role, but measured.
    pub fn is_quantification_only(&self) -> bool {
        self.role == Role::Unassigned && self.quantify
    }

    /// Has any work to do in a run.
    pub fn is_active(&self) -> bool {
        self.used && (self.role != Role::Unassigned || self.quantify)
    }
}

/// Outcome of a role request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleRequest {
    Applied,
    /// Another channel already holds this exclusive role; nothing changed.
    NeedsConfirmation { current_holder: usize },
}

/// Channels discovered for the current directory / file pattern.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
}

impl ChannelRegistry {
    /// `count` channels numbered `1..=count` with default names and endings.
    pub fn new(count: usize) -> Self {
        Self {
            channels: (1..=count).map(Channel::new).collect(),
        }
    }

    pub fn from_channels(mut channels: Vec<Channel>) -> Self {
        channels.sort_by_key(|c| c.index);
        Self { channels }
    }

    /// One channel per ending that matches at least one file name.
    ///
    /// Channel numbers follow the position of the ending in `endings`.
    pub fn discover<S: AsRef<str>>(file_names: &[S], endings: &[EndingPattern]) -> Self {
        let channels: Vec<Channel> = endings
            .iter()
            .enumerate()
            .filter(|(_, ending)| file_names.iter().any(|f| ending.matches(f.as_ref())))
            .map(|(i, ending)| Channel {
                ending: ending.clone(),
                ..Channel::new(i + 1)
            })
            .collect();
        info!(
            files = file_names.len(),
            channels = channels.len(),
            "Discovered channels"
        );
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// 0-based registry position of channel `index`.
    pub fn position(&self, index: usize) -> Option<usize> {
        self.channels.iter().position(|c| c.index == index)
    }

    pub fn channel(&self, index: usize) -> Result<&Channel> {
        let total = self.channels.len();
        self.channels
            .iter()
            .find(|c| c.index == index)
            .ok_or(SpotcellError::ChannelIndexOutOfRange { index, total })
    }

    pub fn channel_mut(&mut self, index: usize) -> Result<&mut Channel> {
        let total = self.channels.len();
        self.channels
            .iter_mut()
            .find(|c| c.index == index)
            .ok_or(SpotcellError::ChannelIndexOutOfRange { index, total })
    }

    pub fn set_used(&mut self, index: usize, used: bool) -> Result<()> {
        self.channel_mut(index)?.used = used;
        Ok(())
    }

    pub fn set_quantify(&mut self, index: usize, quantify: bool) -> Result<()> {
        self.channel_mut(index)?.quantify = quantify;
        Ok(())
    }

    pub fn set_protein_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.channel_mut(index)?.protein_name = name.into();
        Ok(())
    }

    pub fn set_ending(&mut self, index: usize, ending: EndingPattern) -> Result<()> {
        self.channel_mut(index)?.ending = ending;
        Ok(())
    }

    /// Assign `role` to channel `index`.
    ///
    /// A second Nuclei or Cell channel is not applied; the caller must ask the
    /// user and then call [`confirm_role`](Self::confirm_role).
    pub fn request_role(&mut self, index: usize, role: Role) -> Result<RoleRequest> {
        self.channel(index)?;
        if role.is_exclusive() {
            if let Some(holder) = self
                .channels
                .iter()
                .find(|c| c.role == role && c.index != index)
            {
                debug!(channel = index, holder = holder.index, %role, "Role conflict");
                return Ok(RoleRequest::NeedsConfirmation {
                    current_holder: holder.index,
                });
            }
        }
        self.channel_mut(index)?.role = role;
        Ok(RoleRequest::Applied)
    }

    /// Assign `role` to channel `index`, demoting any other holder of an
    /// exclusive role. Returns the demoted channels.
    pub fn confirm_role(&mut self, index: usize, role: Role) -> Result<Vec<usize>> {
        self.channel(index)?;
        let mut demoted = Vec::new();
        if role.is_exclusive() {
            for c in self
                .channels
                .iter_mut()
                .filter(|c| c.role == role && c.index != index)
            {
                c.role = Role::Unassigned;
                demoted.push(c.index);
            }
        }
        self.channel_mut(index)?.role = role;
        if !demoted.is_empty() {
            info!(channel = index, %role, ?demoted, "Exclusive role moved");
        }
        Ok(demoted)
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter().filter(move |c| c.role == role)
    }

    pub fn nuclei_channel(&self) -> Option<&Channel> {
        self.with_role(Role::Nuclei).next()
    }

    pub fn cell_channel(&self) -> Option<&Channel> {
        self.with_role(Role::Cell).next()
    }

    pub fn spot_channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.with_role(Role::Spot)
    }

    pub fn quantified_channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter().filter(|c| c.quantify)
    }

    /// Channels with work to do in a run, in index order.
    pub fn active_channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter().filter(|c| c.is_active())
    }

    pub(crate) fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    /// Restore remembered names, roles and flags for the current channels.
    pub fn load(&mut self, store: &dyn ConfigStore) {
        for c in &mut self.channels {
            let ns = format!("channel{}", c.index);
            c.used = store.get_bool(&pref_key(&ns, "used"), c.used);
            c.quantify = store.get_bool(&pref_key(&ns, "quantify"), c.quantify);
            c.protein_name = store.get_string(&pref_key(&ns, "protein"), &c.protein_name);
            c.role = store
                .get_string(&pref_key(&ns, "role"), &c.role.to_string())
                .parse()
                .unwrap_or(c.role);
        }
    }

    pub fn store(&self, store: &mut dyn ConfigStore) {
        for c in &self.channels {
            let ns = format!("channel{}", c.index);
            store.set(&pref_key(&ns, "used"), c.used.into());
            store.set(&pref_key(&ns, "quantify"), c.quantify.into());
            store.set(&pref_key(&ns, "protein"), c.protein_name.as_str().into());
            store.set(&pref_key(&ns, "role"), c.role.to_string().into());
        }
    }
}
