use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use spotcell_core::batch::{BatchJob, BatchRunner, BatchStatus, ProgressReporter};
use spotcell_core::codec::{Codec, ParameterDocument, ParameterLog, TextLogCodec};
use spotcell_core::error::Result as CoreResult;
use spotcell_core::experiment::{
    discover_fields_of_view, ChannelPlan, Experiment, ExperimentExecutor, ResultTables,
};

use crate::session::Session;
use crate::summary::{print_run_summary, print_session_summary, print_warnings};

use super::list_files;

/// Table written by a dry run.
const PLAN_TABLE: &str = "Experiments";
const PLAN_COLUMNS: &[&str] = &[
    "field",
    "experiment",
    "calibration",
    "nuclei",
    "cell",
    "spots",
    "quantification",
];

#[derive(Args)]
pub struct RunArgs {
    /// Session file (TOML)
    pub session: PathBuf,

    /// Directory holding the channel images
    pub dir: PathBuf,

    /// Continue without asking when the consistency check warns
    #[arg(short, long)]
    pub yes: bool,

    /// Number of Z slices per image, used by the consistency check
    #[arg(long, default_value = "1")]
    pub slices: usize,

    /// Write the result table to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not append the parameters to Parameters.txt
    #[arg(long)]
    pub no_log: bool,
}

/// Records which images each experiment would process.
struct PlanExecutor;

fn file_names<'a>(plans: impl Iterator<Item = &'a ChannelPlan>) -> String {
    plans
        .map(|p| p.image.file_name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

impl ExperimentExecutor for PlanExecutor {
    fn execute(&self, experiment: &Experiment, tables: &mut ResultTables) -> CoreResult<bool> {
        tables.table_mut(PLAN_TABLE, PLAN_COLUMNS).push(vec![
            experiment.field.to_string(),
            experiment.name.to_string(),
            experiment.calibration.name.clone(),
            file_names(experiment.nuclei.iter()),
            file_names(experiment.cell.iter()),
            file_names(experiment.spots.iter()),
            file_names(experiment.quantification.iter()),
        ]);
        Ok(true)
    }
}

struct BarReporter(ProgressBar);

impl ProgressReporter for BarReporter {
    fn begin(&self, total: usize) {
        self.0.set_length(total as u64);
        self.0.set_position(0);
    }

    fn advance(&self, done: usize, _total: usize) {
        self.0.set_position(done as u64);
    }

    fn finish(&self, status: BatchStatus) {
        match status {
            BatchStatus::Completed => self.0.finish_with_message("Done"),
            BatchStatus::Cancelled => self.0.abandon_with_message("Cancelled"),
        }
    }
}

fn ask(question: &str) -> bool {
    let term = Term::stderr();
    if term.write_str(&format!("{question} [y/N] ")).is_err() {
        return false;
    }
    term.read_line()
        .map(|answer| matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
        .unwrap_or(false)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut session = Session::load(&args.session)?;
    let (registry, resolved) = session.resolve()?;
    let files = list_files(&args.dir)?;
    let fields = discover_fields_of_view(&files, &registry);
    if fields.is_empty() {
        bail!("No image in {} matches a channel ending", args.dir.display());
    }
    print_session_summary(&session, &resolved);

    let report = resolved.check_consistency(|_| args.slices);
    report.confirm(|_| {
        print_warnings(&report);
        args.yes || ask("Continue anyway?")
    })?;

    if !args.no_log {
        let doc = ParameterDocument::from_resolved(session.header.clone(), &registry, &resolved);
        ParameterLog::append(&args.dir, &TextLogCodec.encode(&doc))
            .with_context(|| format!("Failed to append parameter log in {}", args.dir.display()))?;
    }

    let pb = ProgressBar::new(fields.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:12} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    pb.set_message("Fields");

    let job = BatchJob {
        fields,
        resolved,
        pattern: session.ending_pattern.clone(),
    };
    let handle = BatchRunner::new().spawn(job, Arc::new(PlanExecutor), Arc::new(BarReporter(pb)))?;
    let outcome = handle.join()?;

    let csv = outcome
        .tables
        .get(PLAN_TABLE)
        .map(|t| t.to_csv())
        .unwrap_or_default();
    match &args.output {
        Some(path) => {
            std::fs::write(path, &csv)
                .with_context(|| format!("Failed to write results to {}", path.display()))?;
            println!("Results saved to {}", path.display());
        }
        None => print!("{csv}"),
    }
    print_run_summary(&outcome);
    Ok(())
}
