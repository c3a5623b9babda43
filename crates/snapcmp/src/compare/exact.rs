use crate::pixel::PixelBuffer;

/// Byte-for-byte equality of two normalized buffers (the memcmp fast path).
pub fn matches(reference: &PixelBuffer, candidate: &PixelBuffer) -> bool {
    reference.size() == candidate.size() && reference.as_bytes() == candidate.as_bytes()
}
