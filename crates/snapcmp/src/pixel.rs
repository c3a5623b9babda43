use std::fmt;

use image::RgbaImage;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::ConversionError;

/// RGBA, 8 bits per channel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel dimensions of a raster image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject degenerate dimensions. Both-zero wins over a single zero axis.
    pub fn validate(self) -> Result<Self, ConversionError> {
        match (self.width, self.height) {
            (0, 0) => Err(ConversionError::ZeroSize),
            (0, _) => Err(ConversionError::ZeroWidth),
            (_, 0) => Err(ConversionError::ZeroHeight),
            _ => Ok(self),
        }
    }

    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Component-wise maximum, used to size the difference canvas.
    pub fn union(self, other: Size) -> Size {
        Size::new(self.width.max(other.width), self.height.max(other.height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Normalized raster: `width * height` pixels of premultiplied RGBA8, rows top to bottom.
///
/// The byte length always equals `width * height * 4`; construction fails otherwise.
/// Zero dimensions are representable so a degenerate capture can be reported
/// with the right [`ConversionError`] instead of panicking somewhere downstream.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: Size,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ConversionError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(ConversionError::RasterizationFailed)?;
        if data.len() != expected {
            return Err(ConversionError::RasterizationFailed);
        }
        Ok(Self {
            size: Size::new(width, height),
            data,
        })
    }

    /// Uniformly filled buffer. `pixel` is already premultiplied.
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let size = Size::new(width, height);
        let data = pixel.repeat(size.pixel_count());
        Self { size, data }
    }

    /// Render a straight-alpha image into the normalized premultiplied layout.
    pub fn from_straight(image: &RgbaImage) -> Self {
        let mut data = Vec::with_capacity(image.as_raw().len());
        for pixel in image.pixels() {
            data.extend_from_slice(&premultiply(pixel.0));
        }
        Self {
            size: Size::new(image.width(), image.height()),
            data,
        }
    }

    /// Straight-alpha copy, the form codecs store.
    pub fn to_straight(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.size.width, self.size.height);
        for (out, px) in image
            .pixels_mut()
            .zip(self.data.chunks_exact(BYTES_PER_PIXEL))
        {
            out.0 = unpremultiply([px[0], px[1], px[2], px[3]]);
        }
        image
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the pixel bytes; the length cannot change.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Premultiplied pixel at `(x, y)`, or `None` outside the bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = (y as usize * self.size.width as usize + x as usize) * BYTES_PER_PIXEL;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Straight to premultiplied alpha, rounding half up.
pub fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let mul = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
    [mul(r), mul(g), mul(b), a]
}

/// Premultiplied to straight alpha. Fully transparent pixels collapse to zero,
/// and colour channels exceeding alpha are clamped.
pub fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let div = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
    [div(r), div(g), div(b), a]
}

/// An encoded snapshot as stored or captured: container bytes plus display scale.
///
/// The scale only affects the logical size reported to callers; all comparison
/// happens in pixel units.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    scale: f64,
}

impl EncodedImage {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            scale: 1.0,
        }
    }

    /// Non-positive or non-finite scales fall back to 1.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Pixel dimensions from the container header, without decoding pixel data.
    pub fn pixel_size(&self, codec: &dyn Codec) -> Result<Size, ConversionError> {
        codec.read_dimensions(&self.bytes)
    }

    /// `(width, height)` in points: pixel size divided by scale.
    pub fn logical_size(&self, codec: &dyn Codec) -> Result<(f64, f64), ConversionError> {
        let size = self.pixel_size(codec)?;
        Ok((
            size.width as f64 / self.scale,
            size.height as f64 / self.scale,
        ))
    }
}

impl From<Vec<u8>> for EncodedImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}
