mod commands;
mod session;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spotcell", about = "Experiment planning for multi-channel cell image quantification")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print or save a default session
    Config(commands::config::ConfigArgs),
    /// Write the parameter log of a session
    Log(commands::log::LogArgs),
    /// Rebuild a session from a parameter log
    ImportLog(commands::import_log::ImportLogArgs),
    /// Show the experiments a session would run on a directory
    Plan(commands::plan::PlanArgs),
    /// Run a session over a directory
    Run(commands::run::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Config(args) => commands::config::run(args),
        Commands::Log(args) => commands::log::run(args),
        Commands::ImportLog(args) => commands::import_log::run(args),
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
