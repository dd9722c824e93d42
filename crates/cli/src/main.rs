//! Churn scoring CLI
//!
//! A command-line tool for scoring customer CSV files against registered
//! churn models and inspecting the model artifacts behind them.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{models, predict};
use scoring_lib::{ScoringError, ScoringService};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Churn scoring CLI
#[derive(Parser)]
#[command(name = "churn")]
#[command(author, version, about = "Batch churn scoring CLI", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/churn/config.toml when present)
    #[arg(long, env = "CHURN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a CSV file with a registered model
    Predict {
        /// Model identifier (e.g. General, Life_Insurance)
        #[arg(long, short)]
        model: String,

        /// Input CSV file
        #[arg(long, short)]
        input: PathBuf,

        /// Write the result table into this directory instead of previewing it
        #[arg(long, short)]
        output_dir: Option<PathBuf>,

        /// Rows to show when previewing results
        #[arg(long, default_value = "10")]
        preview_rows: usize,
    },

    /// List registered models
    Models,

    /// Load a model artifact and show its details
    Inspect {
        /// Model identifier
        #[arg(long, short)]
        model: String,
    },
}

fn init_logging(json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(cli: Cli) -> Result<()> {
    let scoring_config = config::load(cli.config.as_deref())?;
    debug!(
        models_dir = %scoring_config.models_dir.display(),
        models = scoring_config.models.len(),
        cache_models = scoring_config.cache_models,
        "Configuration loaded"
    );
    let service = ScoringService::new(scoring_config)?;

    match cli.command {
        Commands::Predict {
            model,
            input,
            output_dir,
            preview_rows,
        } => {
            predict::predict(&service, &model, input, output_dir, preview_rows, cli.format)?;
        }
        Commands::Models => {
            models::list_models(&service, cli.format)?;
        }
        Commands::Inspect { model } => {
            models::inspect_model(&service, &model, cli.format)?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ScoringError>() {
                Some(scoring) => {
                    output::print_error(&format!("[{}] {}", scoring.kind(), scoring));
                    if let ScoringError::MissingFeatures { missing } = scoring {
                        for name in missing {
                            eprintln!("  - {}", name);
                        }
                    }
                }
                None => output::print_error(&format!("{:#}", e)),
            }
            ExitCode::FAILURE
        }
    }
}
