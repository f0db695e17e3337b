use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use pricing_study::config::StudyConfig;
use pricing_study::logging;
use pricing_study::phases::{available_phases, run_phase, run_workflow};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Workflow {
    Full,
}

#[derive(Parser)]
#[command(name = "pricing_study")]
#[command(about = "Dynamic Pricing Study pipeline runner")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workflow mode
    #[arg(long, value_enum, default_value = "full")]
    workflow: Workflow,

    /// Optional specific phase to run (for debugging/development)
    #[arg(long)]
    phase: Option<u8>,
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = StudyConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let phases = match cli.phase {
        Some(p) => vec![p],
        None => available_phases(),
    };
    let _guard = logging::init_logging(&config.paths.logs, &phases)?;

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    let _enter = span.enter();

    match cli.phase {
        Some(phase) => {
            info!("Dynamic Pricing Study runner initialised for phase {}.", phase);
            if let Err(e) = run_phase(phase, &config) {
                error!("Phase {} failed: {}", phase, e);
                return Err(e.into());
            }
            info!("Phase {} completed successfully.", phase);
            println!("Phase {} completed successfully.", phase);
        }
        None => match cli.workflow {
            Workflow::Full => {
                info!("Dynamic Pricing Study runner initialised for full workflow.");
                if let Err(e) = run_workflow(&config) {
                    error!("Full workflow failed: {}", e);
                    return Err(e.into());
                }
                info!("Full workflow completed successfully.");
                println!("Full workflow completed successfully.");
            }
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
