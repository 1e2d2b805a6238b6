use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spotcell_core::codec::{Codec, ParameterDocument, ParameterLog, TextLogCodec};

use crate::session::Session;

#[derive(Args)]
pub struct LogArgs {
    /// Session file (TOML)
    pub session: PathBuf,

    /// Append to Parameters.txt in this directory instead of printing
    #[arg(long)]
    pub append: Option<PathBuf>,
}

pub fn run(args: &LogArgs) -> Result<()> {
    let mut session = Session::load(&args.session)?;
    let (registry, resolved) = session.resolve()?;
    let doc = ParameterDocument::from_resolved(session.header.clone(), &registry, &resolved);
    let text = TextLogCodec.encode(&doc);

    match &args.append {
        Some(dir) => {
            let path = ParameterLog::append(dir, &text)
                .with_context(|| format!("Failed to append parameter log in {}", dir.display()))?;
            println!("Parameters appended to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
