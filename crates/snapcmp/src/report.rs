//! Turning a [`ComparisonResult`] into what a person reads: a message and the
//! images needed to see the problem.

use tracing::{debug, warn};

use crate::compare::{Comparator, ComparisonResult};
use crate::diff;
use crate::error::ConversionError;
use crate::pixel::{EncodedImage, PixelBuffer};

pub const REFERENCE: &str = "reference";
pub const FAILURE: &str = "failure";
pub const DIFFERENCE: &str = "difference";

/// A named image handed to an [`AttachmentSink`](crate::sink::AttachmentSink).
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: &'static str,
    pub image: PixelBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    /// `reference`, `failure`, `difference` in that order, or empty.
    pub attachments: Vec<Attachment>,
}

impl From<ConversionError> for Failure {
    fn from(err: ConversionError) -> Self {
        Self {
            message: err.to_string(),
            attachments: Vec::new(),
        }
    }
}

/// Fixed message for a result, `None` when it matched.
pub fn message(result: &ComparisonResult) -> Option<String> {
    let msg = match *result {
        ComparisonResult::Matching => return None,
        ComparisonResult::NotMatching => "Snapshot does not match reference".to_string(),
        ComparisonResult::UnequalSize { old, new } => {
            format!("Snapshot size {new} is unequal to expected size {old}")
        }
        ComparisonResult::UnmatchedPrecision { expected, actual } => {
            format!("Actual image precision {actual} is less than expected {expected}")
        }
        ComparisonResult::UnmatchedPrecisions {
            expected_pixel,
            actual_pixel,
            expected_perceptual,
            actual_perceptual,
        } => format!(
            "The percentage of pixels that match {actual_pixel} is less than expected {expected_pixel}\n\
             The lowest perceptual color precision {actual_perceptual} is less than expected {expected_perceptual}"
        ),
        ComparisonResult::ContextConversionFailed => "Core Graphics failure".to_string(),
        ComparisonResult::PerceptualComparisonFailed => "Perceptual comparison failed".to_string(),
    };
    Some(msg)
}

/// Whether a difference image belongs with this result. Engine failures get none.
pub fn wants_diff(result: &ComparisonResult) -> bool {
    match result {
        ComparisonResult::Matching
        | ComparisonResult::ContextConversionFailed
        | ComparisonResult::PerceptualComparisonFailed => false,
        ComparisonResult::NotMatching
        | ComparisonResult::UnequalSize { .. }
        | ComparisonResult::UnmatchedPrecision { .. }
        | ComparisonResult::UnmatchedPrecisions { .. } => true,
    }
}

/// Build the failure report for `result`, rendering the difference image when wanted.
///
/// A difference canvas too large to allocate is left out; the other two
/// attachments are still delivered.
pub fn describe(
    result: &ComparisonResult,
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
) -> Option<Failure> {
    let message = message(result)?;
    let mut attachments = Vec::new();
    if wants_diff(result) {
        attachments.push(Attachment {
            name: REFERENCE,
            image: reference.clone(),
        });
        attachments.push(Attachment {
            name: FAILURE,
            image: candidate.clone(),
        });
        match diff::render(reference, candidate) {
            Ok(image) => attachments.push(Attachment {
                name: DIFFERENCE,
                image,
            }),
            Err(e) => warn!(error = %e, "difference image skipped"),
        }
    }
    Some(Failure {
        message,
        attachments,
    })
}

/// Outcome of a verification: the raw result plus its report, if it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub result: ComparisonResult,
    pub failure: Option<Failure>,
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        self.failure.is_none()
    }
}

/// Compare two encoded snapshots end to end.
pub fn verify(
    comparator: &Comparator,
    reference: &EncodedImage,
    candidate: &EncodedImage,
) -> Result<Verdict, ConversionError> {
    let (reference, candidate) = comparator.decode_pair(reference, candidate)?;
    verify_buffers(comparator, &reference, &candidate)
}

/// Compare a captured buffer against a stored reference.
pub fn verify_snapshot(
    comparator: &Comparator,
    reference: &EncodedImage,
    candidate: &PixelBuffer,
) -> Result<Verdict, ConversionError> {
    let reference = comparator.decode_reference(reference, candidate)?;
    verify_buffers(comparator, &reference, candidate)
}

fn verify_buffers(
    comparator: &Comparator,
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
) -> Result<Verdict, ConversionError> {
    let result = comparator.compare(reference, candidate)?;
    debug!(?result, "comparison finished");
    Ok(Verdict {
        result,
        failure: describe(&result, reference, candidate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Tolerance;
    use crate::pixel::Size;
    use image::{Rgba, RgbaImage};

    fn png(w: u32, h: u32, color: Rgba<u8>) -> EncodedImage {
        let img = RgbaImage::from_pixel(w, h, color);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        EncodedImage::new(buf)
    }

    #[test]
    fn messages_follow_fixed_templates() {
        assert_eq!(message(&ComparisonResult::Matching), None);
        assert_eq!(
            message(&ComparisonResult::NotMatching).as_deref(),
            Some("Snapshot does not match reference")
        );
        assert_eq!(
            message(&ComparisonResult::UnequalSize {
                old: Size::new(100, 100),
                new: Size::new(100, 120),
            })
            .as_deref(),
            Some("Snapshot size 100x120 is unequal to expected size 100x100")
        );
        assert_eq!(
            message(&ComparisonResult::UnmatchedPrecision {
                expected: 0.999,
                actual: 0.995,
            })
            .as_deref(),
            Some("Actual image precision 0.995 is less than expected 0.999")
        );
        assert_eq!(
            message(&ComparisonResult::UnmatchedPrecisions {
                expected_pixel: 1.0,
                actual_pixel: 0.99,
                expected_perceptual: 0.98,
                actual_perceptual: 0.5,
            })
            .as_deref(),
            Some(
                "The percentage of pixels that match 0.99 is less than expected 1\n\
                 The lowest perceptual color precision 0.5 is less than expected 0.98"
            )
        );
        assert_eq!(
            message(&ComparisonResult::ContextConversionFailed).as_deref(),
            Some("Core Graphics failure")
        );
        assert_eq!(
            message(&ComparisonResult::PerceptualComparisonFailed).as_deref(),
            Some("Perceptual comparison failed")
        );
    }

    #[test]
    fn engine_failures_carry_no_attachments() {
        let buf = PixelBuffer::filled(1, 1, [0, 0, 0, 255]);
        for result in [
            ComparisonResult::ContextConversionFailed,
            ComparisonResult::PerceptualComparisonFailed,
        ] {
            let failure = describe(&result, &buf, &buf).unwrap();
            assert!(failure.attachments.is_empty());
        }
    }

    #[test]
    fn mismatch_attaches_three_named_images() {
        let reference = png(4, 4, Rgba([255, 255, 255, 255]));
        let candidate = png(4, 5, Rgba([0, 0, 0, 255]));
        let verdict = verify(&Comparator::default(), &reference, &candidate).unwrap();
        let failure = verdict.failure.unwrap();
        assert_eq!(failure.message, "Snapshot size 4x5 is unequal to expected size 4x4");
        let names: Vec<&str> = failure.attachments.iter().map(|a| a.name).collect();
        assert_eq!(names, [REFERENCE, FAILURE, DIFFERENCE]);
        assert_eq!(failure.attachments[2].image.size(), Size::new(4, 5));
        assert_eq!(failure.attachments[2].image.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn match_produces_no_failure() {
        let a = png(8, 8, Rgba([1, 2, 3, 255]));
        let verdict = verify(&Comparator::default(), &a, &a.clone()).unwrap();
        assert_eq!(verdict.result, ComparisonResult::Matching);
        assert!(verdict.is_match());
        let loose = Comparator::new(Tolerance::new(0.5, 0.5));
        assert!(verify(&loose, &a, &a.clone()).unwrap().is_match());
    }

    #[test]
    fn conversion_errors_surface_verbatim() {
        let good = png(2, 2, Rgba([0, 0, 0, 255]));
        let bad = EncodedImage::new(b"not an image".to_vec());
        let err = verify(&Comparator::default(), &good, &bad).unwrap_err();
        let failure = Failure::from(err);
        assert_eq!(failure.message, "Snapshot data is not a valid image");
        assert!(failure.attachments.is_empty());

        let empty = PixelBuffer::new(0, 3, Vec::new()).unwrap();
        let err = verify_snapshot(&Comparator::default(), &good, &empty).unwrap_err();
        assert_eq!(err.to_string(), "Snapshot has a width of zero");
    }

    #[test]
    fn oversized_difference_is_left_out() {
        let tall = PixelBuffer::filled(1, 65_535, [0, 0, 0, 255]);
        let wide = PixelBuffer::filled(65_535, 1, [0, 0, 0, 255]);
        let result = ComparisonResult::UnequalSize {
            old: tall.size(),
            new: wide.size(),
        };
        let failure = describe(&result, &tall, &wide).unwrap();
        let names: Vec<&str> = failure.attachments.iter().map(|a| a.name).collect();
        assert_eq!(names, [REFERENCE, FAILURE]);
    }

    #[test]
    fn precision_shortfall_message_reports_measured_precision() {
        let reference = PixelBuffer::filled(10, 10, [0, 0, 0, 255]);
        let mut bytes = reference.as_bytes().to_vec();
        // 2 of 400 bytes differ -> 0.995
        bytes[0] = 1;
        bytes[4] = 1;
        let candidate = PixelBuffer::new(10, 10, bytes).unwrap();
        let comparator = Comparator::new(Tolerance::new(0.999, 1.0));
        let reference_png = EncodedImage::new(comparator.codec().encode(&reference).unwrap());
        let verdict = verify_snapshot(&comparator, &reference_png, &candidate).unwrap();
        let failure = verdict.failure.unwrap();
        assert_eq!(
            failure.message,
            "Actual image precision 0.995 is less than expected 0.999"
        );
        assert_eq!(failure.attachments.len(), 3);
    }
}
