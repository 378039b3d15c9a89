//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{manifest_cmd, plan, score};
use crate::domain::ResidualPolicy;
use crate::storage::Config;

#[derive(Parser)]
#[command(name = "metastage")]
#[command(author, version, about = "Dependency-ordered deployment plans and package manifests")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to a metastage.toml (defaults to the nearest one above cwd)
    #[arg(long, short = 'c', global = true, env = "METASTAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// What to do with components caught in dependency cycles
    /// (report, fail, force; overrides the config)
    #[arg(long, global = true)]
    pub residual: Option<ResidualPolicy>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute deployment groups from a dependency edge list
    Plan {
        /// JSON file of dependency rows
        edges: PathBuf,
    },

    /// Write package manifests for every deployment group
    Manifest {
        /// JSON file of dependency rows
        edges: PathBuf,

        /// JSON file describing component types and members
        catalog: PathBuf,

        /// Directory to write manifests into
        #[arg(long, short, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Score how similar two component names are (0-100)
    Score {
        a: String,
        b: String,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(policy) = cli.residual {
        config.project.resolver.residual_policy = policy;
    }

    let format = cli.format.unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format, cli.verbose);

    match &config.source {
        Some(path) => output.verbose_ctx("config", &format!("Loaded {}", path.display())),
        None => output.verbose_ctx("config", "No metastage.toml found, using defaults"),
    }

    match cli.command {
        Commands::Plan { edges } => plan::run(&output, &config, &edges)?,
        Commands::Manifest {
            edges,
            catalog,
            out_dir,
        } => manifest_cmd::run(&output, &config, &edges, &catalog, &out_dir)?,
        Commands::Score { a, b } => score::run(&output, &config, &a, &b)?,
    }

    Ok(())
}
