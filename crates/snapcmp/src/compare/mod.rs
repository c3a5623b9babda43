pub mod exact;
pub mod perceptual;
pub mod threshold;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::{Codec, PngCodec};
use crate::error::ConversionError;
use crate::pixel::{EncodedImage, PixelBuffer, Size};

use self::perceptual::{DifyMetric, PerceptualMetric};

/// Outcome of a single comparison. Mismatches are values, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ComparisonResult {
    Matching,
    NotMatching,
    UnequalSize {
        old: Size,
        new: Size,
    },
    UnmatchedPrecision {
        expected: f64,
        actual: f64,
    },
    UnmatchedPrecisions {
        expected_pixel: f64,
        actual_pixel: f64,
        expected_perceptual: f64,
        actual_perceptual: f64,
    },
    /// The candidate could not be pushed through the reference codec.
    ContextConversionFailed,
    PerceptualComparisonFailed,
}

impl ComparisonResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matching)
    }
}

/// How far a candidate may drift from its reference. Both values lie in `[0, 1]`;
/// `1` is strict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub precision: f64,
    pub perceptual_precision: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            precision: 1.0,
            perceptual_precision: 1.0,
        }
    }
}

impl Tolerance {
    pub fn new(precision: f64, perceptual_precision: f64) -> Self {
        Self {
            precision,
            perceptual_precision,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.precision >= 1.0 && self.perceptual_precision >= 1.0
    }
}

/// Tiered image comparison:
/// 1. size check
/// 2. exact bytes of the normalized buffers
/// 3. exact bytes after pushing the candidate through the reference codec
/// 4. perceptual metric (when `perceptual_precision < 1` and a metric is installed)
///    or byte-count budget
///
/// Stops at the first tier that decides. Holds no state between calls.
pub struct Comparator {
    codec: Box<dyn Codec + Send + Sync>,
    perceptual: Option<Box<dyn PerceptualMetric + Send + Sync>>,
    tolerance: Tolerance,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(Tolerance::default())
    }
}

impl Comparator {
    pub fn new(tolerance: Tolerance) -> Self {
        Self {
            codec: Box::new(PngCodec),
            perceptual: Some(Box::new(DifyMetric::default())),
            tolerance,
        }
    }

    pub fn with_codec(mut self, codec: impl Codec + Send + Sync + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_perceptual_metric(
        mut self,
        metric: impl PerceptualMetric + Send + Sync + 'static,
    ) -> Self {
        self.perceptual = Some(Box::new(metric));
        self
    }

    /// Drop the perceptual tier; tolerance then always goes through the byte budget.
    pub fn without_perceptual(mut self) -> Self {
        self.perceptual = None;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Decode both snapshots. The candidate goes first so its errors win.
    pub fn decode_pair(
        &self,
        reference: &EncodedImage,
        candidate: &EncodedImage,
    ) -> Result<(PixelBuffer, PixelBuffer), ConversionError> {
        let candidate = self.codec.decode(candidate.bytes())?;
        let reference = self.codec.decode(reference.bytes())?;
        Ok((reference, candidate))
    }

    /// Decode the stored reference for a live candidate, checking the
    /// candidate's dimensions first.
    pub fn decode_reference(
        &self,
        reference: &EncodedImage,
        candidate: &PixelBuffer,
    ) -> Result<PixelBuffer, ConversionError> {
        candidate.size().validate()?;
        self.codec.decode(reference.bytes())
    }

    /// Compare two encoded snapshots.
    pub fn compare_encoded(
        &self,
        reference: &EncodedImage,
        candidate: &EncodedImage,
    ) -> Result<ComparisonResult, ConversionError> {
        let (reference, candidate) = self.decode_pair(reference, candidate)?;
        Ok(self.run_tiers(&reference, &candidate))
    }

    /// Compare a freshly captured buffer against a stored reference.
    pub fn compare_snapshot(
        &self,
        reference: &EncodedImage,
        candidate: &PixelBuffer,
    ) -> Result<ComparisonResult, ConversionError> {
        let reference = self.decode_reference(reference, candidate)?;
        Ok(self.run_tiers(&reference, candidate))
    }

    /// Compare two already-decoded buffers.
    pub fn compare(
        &self,
        reference: &PixelBuffer,
        candidate: &PixelBuffer,
    ) -> Result<ComparisonResult, ConversionError> {
        candidate.size().validate()?;
        reference.size().validate()?;
        Ok(self.run_tiers(reference, candidate))
    }

    fn run_tiers(&self, reference: &PixelBuffer, candidate: &PixelBuffer) -> ComparisonResult {
        if reference.size() != candidate.size() {
            debug!(old = %reference.size(), new = %candidate.size(), "size mismatch");
            return ComparisonResult::UnequalSize {
                old: reference.size(),
                new: candidate.size(),
            };
        }

        if exact::matches(reference, candidate) {
            debug!("exact match");
            return ComparisonResult::Matching;
        }

        // Runs even at full precision: it corrects codec noise, it is not a tolerance.
        let reencoded = match self.codec.reencode(candidate) {
            Ok(buffer) if buffer.size() == reference.size() => buffer,
            Ok(buffer) => {
                warn!(codec = self.codec.name(), size = %buffer.size(), "re-encoded size changed");
                return ComparisonResult::ContextConversionFailed;
            }
            Err(e) => {
                warn!(codec = self.codec.name(), error = %e, "re-encoding candidate failed");
                return ComparisonResult::ContextConversionFailed;
            }
        };
        if exact::matches(reference, &reencoded) {
            debug!(codec = self.codec.name(), "match after re-encoding");
            return ComparisonResult::Matching;
        }

        let tolerance = self.tolerance;
        if tolerance.is_strict() {
            return ComparisonResult::NotMatching;
        }

        if tolerance.perceptual_precision < 1.0
            && let Some(metric) = &self.perceptual
        {
            return perceptual::compare(metric.as_ref(), reference, candidate, tolerance);
        }

        threshold::compare(reference, &reencoded, tolerance.precision)
    }
}
