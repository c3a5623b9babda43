use thiserror::Error;

/// Failure to turn a snapshot into comparable pixels (or back into bytes).
///
/// Raised before any comparator runs and aborts the whole comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Snapshot data is not a valid image")]
    InvalidImageData,

    /// The image parsed but could not be rendered into an RGBA bitmap.
    #[error("Snapshot could not be processed")]
    RasterizationFailed,

    #[error("Snapshot could not be processed")]
    EncodingFailed,

    #[error("Snapshot has a width of zero")]
    ZeroWidth,

    #[error("Snapshot has a height of zero")]
    ZeroHeight,

    #[error("Snapshot is empty")]
    ZeroSize,
}
