use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use spotcell_core::calibration::Calibration;
use spotcell_core::channel::ChannelRegistry;
use spotcell_core::codec::{Codec, TextLogCodec};
use spotcell_core::consts::DEFAULT_LOG_HEADER;
use spotcell_core::experiment::EndingPattern;
use spotcell_core::preferences::MemoryStore;
use spotcell_core::settings::RoleConfigurationSet;
use tracing::info;

use crate::session::Session;

#[derive(Args)]
pub struct ImportLogArgs {
    /// Parameter log (Parameters.txt); the last entry is used
    pub log: PathBuf,

    /// Write the session to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &ImportLogArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read {}", args.log.display()))?;
    let doc = TextLogCodec.decode(&text);
    let Some(count) = doc.channels.iter().map(|r| r.index).max() else {
        bail!("No channel records found in {}", args.log.display());
    };

    let mut registry = ChannelRegistry::new(count);
    let mut configs = RoleConfigurationSet::default();
    let transition = doc.apply(&mut registry, &mut configs, &mut MemoryStore::new())?;
    info!(panels = transition.panels.len(), "Panels restored");

    let calibration = match &doc.calibration {
        Some(name) => Calibration {
            name: name.clone(),
            ..Calibration::default()
        },
        None => Calibration::default(),
    };
    let session = Session {
        header: if doc.header.is_empty() {
            DEFAULT_LOG_HEADER.to_string()
        } else {
            doc.header.clone()
        },
        calibration,
        ending_pattern: EndingPattern::default(),
        preferences: None,
        channels: registry.channels().to_vec(),
        configs,
    };

    if let Some(ref path) = args.output {
        session.save(path)?;
        println!("Session saved to {}", path.display());
    } else {
        print!("{}", session.to_toml()?);
    }
    Ok(())
}
