use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spotcell_core::experiment::{discover_fields_of_view, ExperimentAssembler};

use crate::session::Session;
use crate::summary::{print_plan_summary, print_session_summary};

use super::list_files;

#[derive(Args)]
pub struct PlanArgs {
    /// Session file (TOML)
    pub session: PathBuf,

    /// Directory holding the channel images
    pub dir: PathBuf,
}

pub fn run(args: &PlanArgs) -> Result<()> {
    let mut session = Session::load(&args.session)?;
    let (registry, resolved) = session.resolve()?;
    let files = list_files(&args.dir)?;
    let fields = discover_fields_of_view(&files, &registry);
    let experiments = ExperimentAssembler::assemble_all(&fields, &resolved, &session.ending_pattern)
        .with_context(|| format!("Failed to assemble experiments in {}", args.dir.display()))?;

    print_session_summary(&session, &resolved);
    print_plan_summary(&fields, &experiments);
    Ok(())
}
