use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::session::Session;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the session to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save an example session as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let session = Session::example();

    if let Some(ref path) = args.output {
        session.save(path)?;
        println!("Default session saved to {}", path.display());
    } else {
        print!("{}", session.to_toml()?);
    }

    Ok(())
}
