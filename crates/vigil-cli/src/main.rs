//! Vigil operations CLI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::*;

/// Deployment and disaster-recovery operations for the Vigil platform
#[derive(Parser)]
#[command(name = "vigil-ops")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Create a backup set across the platform backends
    Backup(BackupCommand),

    /// Deploy a platform version behind a health gate
    Deploy(DeployCommand),

    /// Roll back to a backup set (latest restorable by default)
    Rollback(RollbackCommand),

    /// Restore backends from a backup set
    Restore(RestoreCommand),

    /// Re-verify a backup set against its manifest
    Verify(VerifyCommand),

    /// Probe platform health
    Health(HealthCommand),

    /// List backup sets in the catalog
    List(ListCommand),
}

/// Output format
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> vigil_common::Result<()> {
    let ctx = context::OpsContext::build(cli.config.as_deref())?;
    match cli.command {
        Commands::Backup(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::Deploy(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::Rollback(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::Restore(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::Verify(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::Health(cmd) => cmd.execute(&ctx, cli.output).await,
        Commands::List(cmd) => cmd.execute(&ctx, cli.output).await,
    }
}
