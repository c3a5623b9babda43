use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{Config, load, validate_precision};
use crate::compare::{Comparator, Tolerance};

const ENV_PRECISION: &str = "SNAPCMP_PRECISION";
const ENV_PERCEPTUAL_PRECISION: &str = "SNAPCMP_PERCEPTUAL_PRECISION";
const ENV_ARTIFACT_DIR: &str = "SNAPCMP_ARTIFACT_DIR";

/// Values extracted from the CLI that participate in the merge.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub precision: Option<f64>,
    pub perceptual_precision: Option<f64>,
    pub no_perceptual: bool,
    pub output: Option<PathBuf>,
}

/// Values read from `SNAPCMP_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub precision: Option<f64>,
    pub perceptual_precision: Option<f64>,
    pub artifact_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let float = |key: &str| -> Result<Option<f64>> {
            lookup(key)
                .map(|v| v.parse::<f64>())
                .transpose()
                .with_context(|| format!("{key} must be a valid float"))
        };
        Ok(Self {
            precision: float(ENV_PRECISION)?,
            perceptual_precision: float(ENV_PERCEPTUAL_PRECISION)?,
            artifact_dir: lookup(ENV_ARTIFACT_DIR).map(PathBuf::from),
        })
    }
}

/// Fully resolved config after CLI > env > file > defaults merge.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub tolerance: Tolerance,
    pub perceptual: bool,
    pub artifact_dir: PathBuf,
}

impl ResolvedConfig {
    pub fn new(cli: CliOverrides) -> Result<Self> {
        let file = load()?;
        let env = EnvOverrides::from_env()?;
        Self::merge(file, env, cli)
    }

    pub fn merge(file: Config, env: EnvOverrides, cli: CliOverrides) -> Result<Self> {
        let precision = cli
            .precision
            .or(env.precision)
            .unwrap_or(file.diff.precision);
        validate_precision("precision", precision).map_err(anyhow::Error::msg)?;

        let perceptual_precision = cli
            .perceptual_precision
            .or(env.perceptual_precision)
            .unwrap_or(file.diff.perceptual_precision);
        validate_precision("perceptual precision", perceptual_precision)
            .map_err(anyhow::Error::msg)?;

        let artifact_dir = cli
            .output
            .or(env.artifact_dir)
            .unwrap_or(file.artifacts.dir);

        Ok(Self {
            tolerance: Tolerance::new(precision, perceptual_precision),
            perceptual: file.diff.perceptual && !cli.no_perceptual,
            artifact_dir,
        })
    }

    pub fn comparator(&self) -> Comparator {
        let comparator = Comparator::new(self.tolerance);
        if self.perceptual {
            comparator
        } else {
            comparator.without_perceptual()
        }
    }
}
