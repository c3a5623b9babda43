pub mod resolve;
pub mod template;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::compare::Tolerance;

pub use self::resolve::{CliOverrides, ResolvedConfig};
pub use self::template::{config_file_exists, write_gitignore, write_template};

pub const CONFIG_DIR: &str = ".snapcmp";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_ARTIFACT_DIR: &str = ".snapcmp/difference";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiffConfig {
    /// Fraction of bytes that must match exactly (0.0-1.0).
    #[serde(default = "strict")]
    pub precision: f64,
    /// Per-pixel perceptual similarity floor (0.0-1.0). 1.0 disables the perceptual tier.
    #[serde(default = "strict")]
    pub perceptual_precision: f64,
    /// Use the dify perceptual metric when `perceptual_precision < 1`.
    #[serde(default = "enabled")]
    pub perceptual: bool,
}

fn strict() -> f64 {
    1.0
}

fn enabled() -> bool {
    true
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            precision: strict(),
            perceptual_precision: strict(),
            perceptual: enabled(),
        }
    }
}

impl DiffConfig {
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.precision, self.perceptual_precision)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArtifactsConfig {
    /// Where reference/failure/difference images go when a comparison fails.
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_DIR)
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
        }
    }
}

pub fn validate_precision(name: &str, v: f64) -> Result<f64, String> {
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("{name} must be between 0.0 and 1.0, got {v}"));
    }
    Ok(v)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

impl Config {
    /// Validate semantic constraints that serde cannot express.
    fn validate(&self) -> Result<()> {
        validate_precision("diff.precision", self.diff.precision).map_err(anyhow::Error::msg)?;
        validate_precision("diff.perceptual_precision", self.diff.perceptual_precision)
            .map_err(anyhow::Error::msg)?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    Path::new(CONFIG_DIR).join(CONFIG_FILE)
}

/// Load `.snapcmp/config.toml`; a missing file yields defaults.
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
