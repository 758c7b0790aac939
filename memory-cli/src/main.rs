use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod errors;
mod output;

use commands::archival::ArchivalCommands;
use commands::health::HealthCommands;
use config::{load_rag_config, CliContext};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "do-memory-cli")]
#[command(about = "Command-line interface for the local indexing/retrieval memory core")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to `~/.claude-rag/config.toml`)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Enable verbose (debug-level) logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Project archival: archive, reactivate, export, and import projects
    Archival {
        #[command(subcommand)]
        command: ArchivalCommands,
    },
    /// Health dashboard, maintenance jobs, and the health scheduler
    Health {
        #[command(subcommand)]
        command: HealthCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let rag_config = load_rag_config(cli.config.as_deref())?;
    let ctx = CliContext::new(rag_config).await?;

    let result = match cli.command {
        Commands::Archival { command } => commands::archival::dispatch(command, &ctx, cli.format).await,
        Commands::Health { command } => commands::health::dispatch(command, &ctx, cli.format).await,
    };

    if let Err(err) = result {
        eprintln!("{err}");
        let exit_code = err
            .downcast_ref::<do_memory_core::Error>()
            .map(do_memory_core::Error::exit_code)
            .unwrap_or(2);
        std::process::exit(exit_code);
    }

    Ok(())
}
