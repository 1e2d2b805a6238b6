use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::channel::ChannelRegistry;

use super::naming::ExperimentName;

/// One channel image of a field of view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub channel: usize,
    pub file_name: String,
    pub path: PathBuf,
}

impl ImageRef {
    pub fn new(channel: usize, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            channel,
            file_name,
            path,
        }
    }
}

/// The images of all channels acquired at one position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOfView {
    /// 1-based, in listing order.
    pub index: usize,
    pub used: bool,
    pub images: BTreeMap<usize, ImageRef>,
}

impl FieldOfView {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            used: true,
            images: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, channel: usize, path: impl Into<PathBuf>) -> Self {
        self.images.insert(channel, ImageRef::new(channel, path));
        self
    }

    pub fn image(&self, channel: usize) -> Option<&ImageRef> {
        self.images.get(&channel)
    }
}

/// Group image paths into fields of view.
///
/// A file belongs to the used channel whose ending matches furthest to the
/// right, the longest ending winning; files sharing the text before that
/// ending form one field of view. Fields are
/// numbered in name order.
pub fn discover_fields_of_view<P: AsRef<Path>>(
    paths: &[P],
    registry: &ChannelRegistry,
) -> Vec<FieldOfView> {
    let mut groups: BTreeMap<ExperimentName, BTreeMap<usize, ImageRef>> = BTreeMap::new();
    let mut unmatched = 0usize;
    for path in paths {
        let path = path.as_ref();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            unmatched += 1;
            continue;
        };
        let hit = registry
            .channels()
            .iter()
            .filter(|c| c.used)
            .filter_map(|c| c.ending.span(file_name).map(|(start, end)| (c, start, end)))
            // `_w10` beats its prefix `_w1`; ties go to the lower channel.
            .max_by_key(|&(c, start, end)| (end, end - start, Reverse(c.index)))
            .and_then(|(c, _, _)| c.ending.strip(file_name).map(|name| (c.index, name)));
        match hit {
            Some((channel, name)) => {
                groups
                    .entry(name)
                    .or_default()
                    .insert(channel, ImageRef::new(channel, path));
            }
            None => unmatched += 1,
        }
    }
    if unmatched > 0 {
        debug!(unmatched, "Files matching no channel ending were ignored");
    }
    let fields: Vec<FieldOfView> = groups
        .into_values()
        .enumerate()
        .map(|(i, images)| FieldOfView {
            index: i + 1,
            used: true,
            images,
        })
        .collect();
    info!(files = paths.len(), fields = fields.len(), "Discovered fields of view");
    fields
}
