//! Pixel-level snapshot comparison.
//!
//! A reference image and a freshly captured candidate are normalized to
//! premultiplied RGBA8, then compared in tiers (exact, re-encoded, perceptual
//! or byte budget). A mismatch is reported as a [`ComparisonResult`] and, via
//! [`report`], as a message plus reference/failure/difference images.

pub mod codec;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod pixel;
pub mod report;
pub mod sink;

pub use codec::{Codec, PngCodec};
pub use compare::perceptual::{DeltaE94, DifyMetric, PerceptualMetric, PerceptualOutcome};
pub use compare::{Comparator, ComparisonResult, Tolerance};
pub use error::ConversionError;
pub use pixel::{EncodedImage, PixelBuffer, Size};
pub use report::{Attachment, Failure, Verdict};
pub use sink::{AttachmentSink, DirectorySink};
