//! Airflow on Fargate CLI
//!
//! A command-line tool for synthesizing the Airflow on Fargate stack into a
//! cloud assembly and inspecting what it declares.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, synth};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Airflow on Fargate CLI
#[derive(Parser)]
#[command(name = "aof")]
#[command(author, version, about = "Synthesize the Airflow on Fargate stack", long_about = None)]
pub struct Cli {
    /// Settings file (TOML or JSON); AOF_* variables override it
    #[arg(long, short, env = "AOF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the stack and write the cloud assembly
    Synth {
        /// Output directory of the cloud assembly
        #[arg(long, short, default_value = stack_lib::engine::DEFAULT_OUTPUT_DIR)]
        out: PathBuf,

        /// Print the template instead of writing files
        #[arg(long)]
        stdout: bool,

        /// Write synthesis metrics in Prometheus text format
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// List declared resources
    Ls {
        /// Only show resources of this type (e.g. AWS::ECS::Service)
        #[arg(long = "type", short)]
        resource_type: Option<String>,
    },

    /// Show the environment shared by the Airflow containers
    Env,

    /// List stack outputs
    Outputs,
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::registry()
        .with(filter)
        .with(json_logs.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json_logs).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Synth {
            out,
            stdout,
            metrics_file,
        } => {
            synth::synthesize(settings, &out, stdout, metrics_file.as_deref(), cli.format).await?;
        }
        Commands::Ls { resource_type } => {
            inspect::list_resources(settings, resource_type.as_deref(), cli.format)?;
        }
        Commands::Env => {
            inspect::show_environment(settings, cli.format)?;
        }
        Commands::Outputs => {
            inspect::show_outputs(settings, cli.format)?;
        }
    }

    Ok(())
}
