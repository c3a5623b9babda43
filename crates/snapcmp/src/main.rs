mod cli;
mod commands;
mod terminal;

use clap::Parser;
use snapcmp::config::{CliOverrides, ResolvedConfig};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snapcmp=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Init { force } => {
            commands::init(force)?;
        }
        cli::Command::Compare {
            reference,
            candidate,
            precision,
            perceptual_precision,
            no_perceptual,
            output,
            json,
        } => {
            let overrides = CliOverrides {
                precision,
                perceptual_precision,
                no_perceptual,
                output,
            };
            let config = ResolvedConfig::new(overrides)?;
            let code = commands::compare(&config, &reference, &candidate, json)?;
            std::process::exit(code);
        }
    }

    Ok(())
}
