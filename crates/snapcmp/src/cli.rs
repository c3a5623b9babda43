use std::path::PathBuf;

use clap::{Parser, Subcommand};

use snapcmp::config;

fn parse_fraction(name: &str, s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{name}: {e}"))?;
    config::validate_precision(name, v)
}

fn parse_precision(s: &str) -> Result<f64, String> {
    parse_fraction("precision", s)
}

fn parse_perceptual_precision(s: &str) -> Result<f64, String> {
    parse_fraction("perceptual_precision", s)
}

#[derive(Parser)]
#[command(
    name = "snapcmp",
    about = "Compare image snapshots against reference images"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create .snapcmp/config.toml with default settings
    Init {
        /// Overwrite existing config and gitignore
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Compare a candidate image against its reference (exit 0/1)
    Compare {
        /// Reference image (PNG)
        reference: PathBuf,
        /// Candidate image (PNG)
        candidate: PathBuf,
        /// Fraction of bytes that must match (0.0–1.0)
        #[arg(long, short = 'p', value_parser = parse_precision)]
        precision: Option<f64>,
        /// Per-pixel perceptual similarity floor (0.0–1.0)
        #[arg(long, value_parser = parse_perceptual_precision)]
        perceptual_precision: Option<f64>,
        /// Never use the perceptual metric; tolerance goes through the byte budget
        #[arg(long)]
        no_perceptual: bool,
        /// Directory for reference/failure/difference images (overrides config)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Print the comparison result as JSON
        #[arg(long)]
        json: bool,
    },
}
