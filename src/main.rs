//! Galaxy Zoo - Main Entry Point

use clap::Parser;
use galaxy_zoo::cli::{cmd_list, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "galaxy_zoo=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { experiment, outfile } => {
            cmd_run(cli.settings()?, *experiment, outfile.clone())?;
        }
        Commands::List => {
            cmd_list()?;
        }
    }

    Ok(())
}
