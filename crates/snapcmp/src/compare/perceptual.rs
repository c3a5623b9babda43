//! Perceptual tier: a pluggable colour-distance metric and the mapping of its
//! verdict onto [`ComparisonResult`].

use std::collections::HashSet;

use image::RgbaImage;
use tracing::{debug, warn};

use super::{ComparisonResult, Tolerance};
use crate::pixel::PixelBuffer;

/// Verdict of a perceptual metric over two equal-size buffers.
#[derive(Debug, Clone, PartialEq)]
pub enum PerceptualOutcome {
    Match,
    NoMatch,
    /// Measured precisions fell short of what was asked.
    Shortfall {
        actual_pixel_precision: f64,
        actual_perceptual_precision: f64,
    },
    Failed(String),
}

pub trait PerceptualMetric {
    fn name(&self) -> &str;

    /// `perceptual_precision` sets the per-pixel similarity floor,
    /// `pixel_precision` the fraction of pixels that must clear it.
    fn compare(
        &self,
        reference: &PixelBuffer,
        candidate: &PixelBuffer,
        pixel_precision: f64,
        perceptual_precision: f64,
    ) -> PerceptualOutcome;
}

pub fn compare(
    metric: &dyn PerceptualMetric,
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
    tolerance: Tolerance,
) -> ComparisonResult {
    let outcome = metric.compare(
        reference,
        candidate,
        tolerance.precision,
        tolerance.perceptual_precision,
    );
    debug!(metric = metric.name(), ?outcome, "perceptual comparison");
    match outcome {
        PerceptualOutcome::Match => ComparisonResult::Matching,
        PerceptualOutcome::NoMatch => ComparisonResult::NotMatching,
        PerceptualOutcome::Shortfall {
            actual_pixel_precision,
            actual_perceptual_precision,
        } => ComparisonResult::UnmatchedPrecisions {
            expected_pixel: tolerance.precision,
            actual_pixel: actual_pixel_precision,
            expected_perceptual: tolerance.perceptual_precision,
            actual_perceptual: actual_perceptual_precision,
        },
        PerceptualOutcome::Failed(reason) => {
            warn!(metric = metric.name(), %reason, "perceptual metric failed");
            ComparisonResult::PerceptualComparisonFailed
        }
    }
}

/// Maximum possible delta in YIQ colour space (used by dify internally).
const MAX_YIQ_POSSIBLE_DELTA: f32 = 35215.0;

/// Halvings spent narrowing the reported perceptual precision on a shortfall.
const PRECISION_SEARCH_STEPS: u32 = 12;

/// Default metric: pixelmatch-style YIQ distance via `dify`.
///
/// `1 - perceptual_precision` plays the role of dify's raw threshold, so a
/// pixel differs when its YIQ delta exceeds `MAX_YIQ_POSSIBLE_DELTA * t * t`.
/// On a shortfall the reported perceptual precision is the strictest one at
/// which no pixel would differ, found by bisecting the threshold.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifyMetric {
    /// Skip pixels dify classifies as anti-aliasing. Off by default so the
    /// measured pixel precision counts every differing pixel.
    pub detect_anti_aliased: bool,
}

impl DifyMetric {
    /// Number of pixels whose YIQ delta exceeds the threshold for `t`.
    fn count_differing(&self, reference: &RgbaImage, candidate: &RgbaImage, t: f64) -> u64 {
        let t = t.clamp(0.0, 1.0) as f32;
        let computed_threshold = MAX_YIQ_POSSIBLE_DELTA * t * t;

        let output_base = Some(dify::cli::OutputImageBase::LeftImage);
        let block_out: Option<HashSet<(u32, u32)>> = None;

        // get_results takes ownership, so we clone.
        match dify::diff::get_results(
            reference.clone(),
            candidate.clone(),
            computed_threshold,
            self.detect_anti_aliased,
            Some(0.1),
            &output_base,
            &block_out,
        ) {
            Some((diff_count, _)) => diff_count.max(0) as u64,
            // None means no pixel crossed the threshold
            None => 0,
        }
    }

    /// Smallest threshold `t` in `(lo, 1]` with no differing pixel, as `1 - t`.
    fn lowest_precision(&self, reference: &RgbaImage, candidate: &RgbaImage, lo: f64) -> f64 {
        let (mut lo, mut hi) = (lo, 1.0);
        for _ in 0..PRECISION_SEARCH_STEPS {
            let mid = (lo + hi) / 2.0;
            if self.count_differing(reference, candidate, mid) == 0 {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        1.0 - hi
    }
}

impl PerceptualMetric for DifyMetric {
    fn name(&self) -> &str {
        "dify"
    }

    fn compare(
        &self,
        reference: &PixelBuffer,
        candidate: &PixelBuffer,
        pixel_precision: f64,
        perceptual_precision: f64,
    ) -> PerceptualOutcome {
        if reference.size() != candidate.size() {
            return PerceptualOutcome::Failed(format!(
                "buffer sizes differ: {} vs {}",
                reference.size(),
                candidate.size()
            ));
        }
        let total = reference.size().pixel_count();
        if total == 0 {
            return PerceptualOutcome::Match;
        }

        let left = reference.to_straight();
        let right = candidate.to_straight();
        let threshold = 1.0 - perceptual_precision;
        let differing = self.count_differing(&left, &right, threshold);

        let actual_pixel_precision = 1.0 - differing as f64 / total as f64;
        if actual_pixel_precision >= pixel_precision {
            return PerceptualOutcome::Match;
        }
        PerceptualOutcome::Shortfall {
            actual_pixel_precision,
            actual_perceptual_precision: self.lowest_precision(&left, &right, threshold),
        }
    }
}

/// CIE L*a*b* colour (D65 white point).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    /// Premultiplied sRGB pixel, i.e. the colour as composited over black.
    #[allow(clippy::excessive_precision)]
    pub fn from_premultiplied([r, g, b, _]: [u8; 4]) -> Self {
        let r = srgb_to_linear(r);
        let g = srgb_to_linear(g);
        let b = srgb_to_linear(b);

        let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
        let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
        let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

        let fx = lab_f(x / 0.95047);
        let fy = lab_f(y);
        let fz = lab_f(z / 1.08883);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Premultiplied sRGB pixel composited over white.
    pub fn over_white([r, g, b, a]: [u8; 4]) -> Self {
        let backdrop = 255 - a;
        Self::from_premultiplied([
            r.saturating_add(backdrop),
            g.saturating_add(backdrop),
            b.saturating_add(backdrop),
            255,
        ])
    }
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE94 colour difference with graphic-arts weights. Opt in with
/// [`Comparator::with_perceptual_metric`](super::Comparator::with_perceptual_metric).
///
/// Each pixel is measured composited over black and over white and the larger
/// ΔE counts, so alpha changes are visible. ΔE is capped at 100. A pixel counts
/// as different when its ΔE exceeds `(1 - perceptual_precision) * 100`; the
/// reported perceptual precision on a shortfall is `1 - max ΔE / 100`.
#[derive(Debug, Clone, Copy)]
pub struct DeltaE94 {
    pub k_l: f64,
    pub k1: f64,
    pub k2: f64,
}

impl Default for DeltaE94 {
    fn default() -> Self {
        Self {
            k_l: 1.0,
            k1: 0.045,
            k2: 0.015,
        }
    }
}

impl DeltaE94 {
    pub fn delta_e(&self, reference: Lab, candidate: Lab) -> f64 {
        let dl = reference.l - candidate.l;
        let c1 = reference.a.hypot(reference.b);
        let c2 = candidate.a.hypot(candidate.b);
        let dc = c1 - c2;
        let da = reference.a - candidate.a;
        let db = reference.b - candidate.b;
        // Rounding can push this slightly negative for near-identical hues.
        let dh_sq = (da * da + db * db - dc * dc).max(0.0);

        let sc = 1.0 + self.k1 * c1;
        let sh = 1.0 + self.k2 * c1;

        let l_term = dl / self.k_l;
        let c_term = dc / sc;
        (l_term * l_term + c_term * c_term + dh_sq / (sh * sh)).sqrt()
    }

    /// ΔE between two premultiplied pixels, the worse of both backdrops, in `[0, 100]`.
    fn pixel_delta(&self, old: [u8; 4], new: [u8; 4]) -> f64 {
        let over_black = self.delta_e(Lab::from_premultiplied(old), Lab::from_premultiplied(new));
        let over_white = self.delta_e(Lab::over_white(old), Lab::over_white(new));
        over_black.max(over_white).clamp(0.0, 100.0)
    }
}

impl PerceptualMetric for DeltaE94 {
    fn name(&self) -> &str {
        "cie94"
    }

    fn compare(
        &self,
        reference: &PixelBuffer,
        candidate: &PixelBuffer,
        pixel_precision: f64,
        perceptual_precision: f64,
    ) -> PerceptualOutcome {
        if reference.size() != candidate.size() {
            return PerceptualOutcome::Failed(format!(
                "buffer sizes differ: {} vs {}",
                reference.size(),
                candidate.size()
            ));
        }
        let total = reference.size().pixel_count();
        if total == 0 {
            return PerceptualOutcome::Match;
        }

        let floor = (1.0 - perceptual_precision) * 100.0;
        let mut differing = 0usize;
        let mut max_delta = 0.0f64;
        for (old, new) in reference.pixels().zip(candidate.pixels()) {
            if old == new {
                continue;
            }
            let delta = self.pixel_delta(old, new);
            if delta.is_nan() {
                return PerceptualOutcome::Failed("non-finite colour distance".to_string());
            }
            if delta > floor {
                differing += 1;
            }
            max_delta = max_delta.max(delta);
        }

        let actual_pixel_precision = 1.0 - differing as f64 / total as f64;
        if actual_pixel_precision >= pixel_precision {
            return PerceptualOutcome::Match;
        }
        PerceptualOutcome::Shortfall {
            actual_pixel_precision,
            actual_perceptual_precision: 1.0 - max_delta / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    fn with_pixel(base: &PixelBuffer, x: u32, y: u32, px: [u8; 4]) -> PixelBuffer {
        let mut bytes = base.as_bytes().to_vec();
        let i = ((y * base.width() + x) * 4) as usize;
        bytes[i..i + 4].copy_from_slice(&px);
        PixelBuffer::new(base.width(), base.height(), bytes).unwrap()
    }

    #[test]
    fn lab_of_white_and_black() {
        let white = Lab::from_premultiplied([255, 255, 255, 255]);
        assert!(close(white.l, 100.0, 1e-3));
        assert!(close(white.a, 0.0, 1e-2));
        assert!(close(white.b, 0.0, 1e-2));

        let black = Lab::from_premultiplied([0, 0, 0, 255]);
        assert!(close(black.l, 0.0, 1e-9));
    }

    #[test]
    fn delta_e_of_identical_colours_is_zero() {
        let lab = Lab::from_premultiplied([12, 200, 99, 255]);
        assert_eq!(DeltaE94::default().delta_e(lab, lab), 0.0);
    }

    #[test]
    fn delta_e_between_black_and_white_is_lightness() {
        let white = Lab::from_premultiplied([255, 255, 255, 255]);
        let black = Lab::from_premultiplied([0, 0, 0, 255]);
        assert!(close(DeltaE94::default().delta_e(white, black), 100.0, 1e-2));
    }

    #[test]
    fn tiny_nudge_is_within_perceptual_floor() {
        let reference = PixelBuffer::filled(10, 10, [128, 128, 128, 255]);
        let candidate = with_pixel(&reference, 3, 3, [129, 128, 128, 255]);
        let outcome = DeltaE94::default().compare(&reference, &candidate, 1.0, 0.98);
        assert_eq!(outcome, PerceptualOutcome::Match);
    }

    #[test]
    fn large_change_reports_shortfall() {
        let reference = PixelBuffer::filled(10, 10, [255, 255, 255, 255]);
        let candidate = with_pixel(&reference, 0, 0, [0, 0, 0, 255]);
        match DeltaE94::default().compare(&reference, &candidate, 1.0, 0.98) {
            PerceptualOutcome::Shortfall {
                actual_pixel_precision,
                actual_perceptual_precision,
            } => {
                assert!(close(actual_pixel_precision, 0.99, 1e-12));
                assert!(close(actual_perceptual_precision, 0.0, 1e-3));
            }
            other => panic!("expected shortfall, got {other:?}"),
        }
    }

    #[test]
    fn pixel_precision_absorbs_few_outliers() {
        let reference = PixelBuffer::filled(10, 10, [255, 255, 255, 255]);
        let candidate = with_pixel(&reference, 0, 0, [0, 0, 0, 255]);
        let outcome = DeltaE94::default().compare(&reference, &candidate, 0.985, 0.98);
        assert_eq!(outcome, PerceptualOutcome::Match);
    }

    #[test]
    fn mismatched_sizes_fail() {
        let a = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        let b = PixelBuffer::filled(2, 3, [0, 0, 0, 255]);
        assert!(matches!(
            DeltaE94::default().compare(&a, &b, 1.0, 0.9),
            PerceptualOutcome::Failed(_)
        ));
    }

    #[test]
    fn zero_perceptual_precision_accepts_any_colour() {
        let white = PixelBuffer::filled(2, 2, [255, 255, 255, 255]);
        let black = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        assert_eq!(
            DeltaE94::default().compare(&white, &black, 1.0, 0.0),
            PerceptualOutcome::Match
        );
    }

    #[test]
    fn reported_precision_never_goes_negative() {
        let white = PixelBuffer::filled(2, 2, [255, 255, 255, 255]);
        let black = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        match DeltaE94::default().compare(&white, &black, 1.0, 0.5) {
            PerceptualOutcome::Shortfall {
                actual_perceptual_precision,
                ..
            } => assert!(actual_perceptual_precision >= 0.0),
            other => panic!("expected shortfall, got {other:?}"),
        }
    }

    #[test]
    fn transparency_counts_as_a_colour_change() {
        let opaque = PixelBuffer::filled(4, 4, [0, 0, 0, 255]);
        let clear = PixelBuffer::filled(4, 4, [0, 0, 0, 0]);
        match DeltaE94::default().compare(&opaque, &clear, 1.0, 0.99) {
            PerceptualOutcome::Shortfall {
                actual_pixel_precision,
                ..
            } => assert_eq!(actual_pixel_precision, 0.0),
            other => panic!("expected shortfall, got {other:?}"),
        }
    }

    #[test]
    fn over_white_fills_uncovered_coverage() {
        let white = Lab::from_premultiplied([255, 255, 255, 255]);
        assert_eq!(Lab::over_white([0, 0, 0, 0]), white);
        assert_eq!(
            Lab::over_white([10, 20, 30, 255]),
            Lab::from_premultiplied([10, 20, 30, 255])
        );
    }

    #[test]
    fn dify_ignores_imperceptible_nudge() {
        let reference = PixelBuffer::filled(10, 10, [128, 128, 128, 255]);
        let candidate = with_pixel(&reference, 3, 3, [129, 128, 128, 255]);
        let outcome = DifyMetric::default().compare(&reference, &candidate, 1.0, 0.98);
        assert_eq!(outcome, PerceptualOutcome::Match);
    }

    #[test]
    fn dify_reports_shortfall_with_searched_precision() {
        let reference = PixelBuffer::filled(10, 10, [255, 255, 255, 255]);
        let candidate = with_pixel(&reference, 0, 0, [0, 0, 0, 255]);
        match DifyMetric::default().compare(&reference, &candidate, 1.0, 0.98) {
            PerceptualOutcome::Shortfall {
                actual_pixel_precision,
                actual_perceptual_precision,
            } => {
                assert!(close(actual_pixel_precision, 0.99, 1e-12));
                assert!(actual_perceptual_precision >= 0.0);
                assert!(actual_perceptual_precision < 0.98);
            }
            other => panic!("expected shortfall, got {other:?}"),
        }
    }

    #[test]
    fn dify_pixel_precision_absorbs_few_outliers() {
        let reference = PixelBuffer::filled(10, 10, [255, 255, 255, 255]);
        let candidate = with_pixel(&reference, 0, 0, [0, 0, 0, 255]);
        let outcome = DifyMetric::default().compare(&reference, &candidate, 0.985, 0.98);
        assert_eq!(outcome, PerceptualOutcome::Match);
    }

    #[test]
    fn dify_rejects_mismatched_sizes() {
        let a = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        let b = PixelBuffer::filled(3, 2, [0, 0, 0, 255]);
        assert!(matches!(
            DifyMetric::default().compare(&a, &b, 1.0, 0.9),
            PerceptualOutcome::Failed(_)
        ));
    }

    struct Fixed(PerceptualOutcome);

    impl PerceptualMetric for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn compare(&self, _: &PixelBuffer, _: &PixelBuffer, _: f64, _: f64) -> PerceptualOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn outcomes_map_onto_results() {
        let buf = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        let tolerance = Tolerance::new(0.9, 0.95);
        let run = |outcome| compare(&Fixed(outcome), &buf, &buf, tolerance);

        assert_eq!(run(PerceptualOutcome::Match), ComparisonResult::Matching);
        assert_eq!(run(PerceptualOutcome::NoMatch), ComparisonResult::NotMatching);
        assert_eq!(
            run(PerceptualOutcome::Failed("colour space".into())),
            ComparisonResult::PerceptualComparisonFailed
        );
        assert_eq!(
            run(PerceptualOutcome::Shortfall {
                actual_pixel_precision: 0.5,
                actual_perceptual_precision: 0.25,
            }),
            ComparisonResult::UnmatchedPrecisions {
                expected_pixel: 0.9,
                actual_pixel: 0.5,
                expected_perceptual: 0.95,
                actual_perceptual: 0.25,
            }
        );
    }
}
