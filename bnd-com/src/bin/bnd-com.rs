//! CLI entry point for bnd-com.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// bnd-com — resolve COM-style declarations into a model manifest.
#[derive(Parser, Debug)]
#[command(name = "bnd-com", version, about)]
struct Cli {
    /// Path to the bnd-com.toml configuration file.
    #[arg(default_value = "bnd-com.toml")]
    config: PathBuf,

    /// Output file path (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bnd_com=info")),
        )
        .init();

    let cli = Cli::parse();
    bnd_com::run(&cli.config, cli.output.as_deref())?;
    Ok(())
}
