use tracing::debug;

use super::ComparisonResult;
use crate::pixel::PixelBuffer;

/// Number of differing bytes tolerated at `precision`: `floor((1 - precision) * total)`.
pub fn byte_budget(precision: f64, total_bytes: usize) -> usize {
    ((1.0 - precision) * total_bytes as f64).floor().max(0.0) as usize
}

pub fn count_differing_bytes(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

/// Budgeted byte comparison.
///
/// Counts bytes, not pixels: a pixel differing only in alpha costs one unit of
/// the budget, a pixel differing in all four channels costs four.
pub fn compare(reference: &PixelBuffer, candidate: &PixelBuffer, precision: f64) -> ComparisonResult {
    let total = reference.byte_len();
    let budget = byte_budget(precision, total);
    let differing = count_differing_bytes(reference.as_bytes(), candidate.as_bytes());
    debug!(differing, budget, total, "threshold comparison");

    if differing > budget {
        let actual = 1.0 - differing as f64 / total as f64;
        return ComparisonResult::UnmatchedPrecision {
            expected: precision,
            actual,
        };
    }
    ComparisonResult::Matching
}
