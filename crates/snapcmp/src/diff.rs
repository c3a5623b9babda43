//! Visual difference artifact. Never consulted for the match decision.

use image::{ColorType, Limits};
use tracing::warn;

use crate::error::ConversionError;
use crate::pixel::{BYTES_PER_PIXEL, PixelBuffer};

/// Render `reference` over `candidate` with a difference blend.
///
/// The canvas is opaque black, sized to cover both images, both anchored
/// top-left. The candidate is drawn normally, then the reference is blended
/// with `|dst - src|` per channel, so unchanged regions come out black.
///
/// Fails with `RasterizationFailed` when the canvas would exceed the `image`
/// crate's default allocation limit.
pub fn render(
    reference: &PixelBuffer,
    candidate: &PixelBuffer,
) -> Result<PixelBuffer, ConversionError> {
    let size = reference.size().union(candidate.size());
    if let Err(e) = Limits::default().reserve_buffer(size.width, size.height, ColorType::Rgba8) {
        warn!(%size, error = %e, "difference canvas too large");
        return Err(ConversionError::RasterizationFailed);
    }
    let mut canvas = PixelBuffer::filled(size.width, size.height, [0, 0, 0, 255]);
    let stride = size.width as usize * BYTES_PER_PIXEL;
    let out = canvas.as_bytes_mut();

    draw(out, stride, candidate, |src, dst| {
        // Source-over onto opaque black keeps the premultiplied colour.
        for c in 0..3 {
            let s = src[c] as u32;
            let d = dst[c] as u32;
            dst[c] = ((s * 255 + d * (255 - src[3] as u32) + 127) / 255).min(255) as u8;
        }
    });

    draw(out, stride, reference, |src, dst| {
        let sa = src[3] as u32;
        for c in 0..3 {
            let s = src[c] as u32;
            let d = dst[c] as u32;
            // Premultiplied difference over an opaque backdrop:
            // s + d - 2 * min(s, d * sa)
            let m = (s * 255).min(d * sa);
            dst[c] = ((s * 255 + d * 255 - 2 * m + 127) / 255).min(255) as u8;
        }
    });

    Ok(canvas)
}

fn draw(out: &mut [u8], stride: usize, image: &PixelBuffer, blend: impl Fn(&[u8], &mut [u8])) {
    let row_len = image.width() as usize * BYTES_PER_PIXEL;
    if row_len == 0 {
        return;
    }
    for (y, row) in image.as_bytes().chunks_exact(row_len).enumerate() {
        let start = y * stride;
        let dst_row = &mut out[start..start + row_len];
        for (src, dst) in row
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(dst_row.chunks_exact_mut(BYTES_PER_PIXEL))
        {
            blend(src, dst);
        }
    }
}
