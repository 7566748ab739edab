//! vsnd CLI - probe, play and record through the virtual PCM backend.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::common::{BackendKind, Context};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vsnd")]
#[command(author, version, about = "Virtual PCM backend", long_about = None)]
struct Cli {
    /// Configuration file, or the name of one in the user config directory
    /// (defaults to config.toml there, if present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Hardware backend to drive
    #[arg(long, global = true, value_enum)]
    #[arg(default_value_t = BackendKind::default())]
    backend: BackendKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate stream parameters against a device and print the result
    Probe(commands::probe::ProbeArgs),

    /// Play a 16-bit WAV file
    Play(commands::play::PlayArgs),

    /// Record into a 16-bit WAV file
    Record(commands::record::RecordArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::new(cli.config.as_deref(), cli.backend)?;

    match cli.command {
        Commands::Probe(args) => commands::probe::run(&ctx, args),
        Commands::Play(args) => commands::play::run(&ctx, args),
        Commands::Record(args) => commands::record::run(&ctx, args),
    }
}
