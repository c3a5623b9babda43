use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use snapcmp::config::ResolvedConfig;
use snapcmp::report;
use snapcmp::{DirectorySink, EncodedImage};

use crate::terminal;

fn read_image(path: &Path) -> Result<EncodedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(EncodedImage::new(bytes))
}

/// `snapcmp compare`: compare, report, write artifacts on failure.
/// Returns exit code: 0 = match, 1 = mismatch or unusable snapshot.
pub fn compare(
    config: &ResolvedConfig,
    reference_path: &Path,
    candidate_path: &Path,
    json: bool,
) -> Result<i32> {
    let start = Instant::now();
    let reference = read_image(reference_path)?;
    let candidate = read_image(candidate_path)?;
    let name = candidate_path.display().to_string();

    let comparator = config.comparator();
    debug!(tolerance = ?comparator.tolerance(), "comparing {name}");

    // Artifacts belong to the latest run only.
    let mut sink = DirectorySink::new(&config.artifact_dir);
    sink.clear()?;

    let verdict = match report::verify(&comparator, &reference, &candidate) {
        Ok(verdict) => verdict,
        Err(e) => {
            if json {
                println!("{}", json!({ "error": e.to_string() }));
            } else {
                terminal::print_error_line(&name, &e.to_string());
            }
            return Ok(1);
        }
    };
    let elapsed = start.elapsed();

    if json {
        let out =
            serde_json::to_string_pretty(&verdict.result).context("Failed to serialize result")?;
        println!("{out}");
    }

    match verdict.failure {
        None => {
            if !json {
                terminal::print_pass_line(&name, elapsed);
            }
            Ok(0)
        }
        Some(failure) => {
            failure.deliver(&mut sink)?;
            if !json {
                terminal::print_fail_line(&name, &failure.message, elapsed);
                terminal::print_artifacts(sink.written());
            }
            Ok(1)
        }
    }
}
