use std::io::Cursor;

use image::{ImageError, ImageFormat, ImageReader, RgbaImage};

use crate::error::ConversionError;
use crate::pixel::{PixelBuffer, Size};

/// Container adapter: the only place that knows an on-disk image format.
///
/// Implementors provide the raw container operations; `decode`/`encode` layer
/// the degenerate-size checks and alpha normalization on top so every codec
/// yields the same premultiplied layout.
pub trait Codec {
    fn name(&self) -> &str;

    /// Read pixel dimensions from the header only.
    fn read_dimensions(&self, bytes: &[u8]) -> Result<Size, ConversionError>;

    /// Fully decode to straight-alpha RGBA8.
    fn rasterize(&self, bytes: &[u8]) -> Result<RgbaImage, ConversionError>;

    /// Serialize a straight-alpha RGBA8 image.
    fn serialize(&self, image: &RgbaImage) -> Result<Vec<u8>, ConversionError>;

    fn decode(&self, bytes: &[u8]) -> Result<PixelBuffer, ConversionError> {
        let size = self.read_dimensions(bytes)?.validate()?;
        let image = self.rasterize(bytes)?;
        if Size::new(image.width(), image.height()) != size {
            return Err(ConversionError::RasterizationFailed);
        }
        Ok(PixelBuffer::from_straight(&image))
    }

    /// Size checks run before the container encoder is touched.
    fn encode(&self, buffer: &PixelBuffer) -> Result<Vec<u8>, ConversionError> {
        buffer.size().validate()?;
        self.serialize(&buffer.to_straight())
    }

    /// Push a buffer through this codec and back.
    fn reencode(&self, buffer: &PixelBuffer) -> Result<PixelBuffer, ConversionError> {
        let bytes = self.encode(buffer)?;
        self.decode(&bytes)
    }
}

/// Lossless PNG, the format references are stored in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngCodec;

fn classify(err: ImageError) -> ConversionError {
    match err {
        // The stream parsed but holds something we cannot render to RGBA8.
        ImageError::Unsupported(_) | ImageError::Limits(_) => ConversionError::RasterizationFailed,
        _ => ConversionError::InvalidImageData,
    }
}

impl Codec for PngCodec {
    fn name(&self) -> &str {
        "png"
    }

    fn read_dimensions(&self, bytes: &[u8]) -> Result<Size, ConversionError> {
        let (width, height) = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png)
            .into_dimensions()
            .map_err(classify)?;
        Ok(Size::new(width, height))
    }

    fn rasterize(&self, bytes: &[u8]) -> Result<RgbaImage, ConversionError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(classify)?;
        Ok(image.to_rgba8())
    }

    fn serialize(&self, image: &RgbaImage) -> Result<Vec<u8>, ConversionError> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|_| ConversionError::EncodingFailed)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_png(w: u32, h: u32, color: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, color);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_into_premultiplied_rgba() {
        let png = solid_png(4, 3, Rgba([200, 100, 50, 128]));
        let buf = PngCodec.decode(&png).unwrap();
        assert_eq!(buf.size(), Size::new(4, 3));
        assert_eq!(buf.byte_len(), 4 * 3 * 4);
        assert_eq!(buf.pixel(0, 0), Some([100, 50, 25, 128]));
    }

    #[test]
    fn garbage_is_invalid_image_data() {
        assert_eq!(
            PngCodec.decode(b"definitely not a png"),
            Err(ConversionError::InvalidImageData)
        );
        assert_eq!(PngCodec.decode(&[]), Err(ConversionError::InvalidImageData));
    }

    #[test]
    fn truncated_stream_is_invalid_image_data() {
        let png = solid_png(64, 64, Rgba([1, 2, 3, 255]));
        let truncated = &png[..png.len() / 2];
        assert_eq!(
            PngCodec.decode(truncated),
            Err(ConversionError::InvalidImageData)
        );
    }

    #[test]
    fn other_formats_are_rejected() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let mut bmp = Vec::new();
        img.write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)
            .unwrap();
        assert_eq!(PngCodec.decode(&bmp), Err(ConversionError::InvalidImageData));
    }

    #[test]
    fn encode_checks_size_before_encoding() {
        let empty = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        assert_eq!(PngCodec.encode(&empty), Err(ConversionError::ZeroSize));
        let no_width = PixelBuffer::new(0, 4, Vec::new()).unwrap();
        assert_eq!(PngCodec.encode(&no_width), Err(ConversionError::ZeroWidth));
        let no_height = PixelBuffer::new(4, 0, Vec::new()).unwrap();
        assert_eq!(PngCodec.encode(&no_height), Err(ConversionError::ZeroHeight));
    }

    #[test]
    fn encode_then_decode_preserves_valid_pixels() {
        let png = solid_png(5, 5, Rgba([10, 20, 30, 77]));
        let buf = PngCodec.decode(&png).unwrap();
        assert_eq!(PngCodec.reencode(&buf).unwrap(), buf);
    }

    #[test]
    fn reencode_normalizes_colour_under_zero_alpha() {
        // Colour under zero alpha is not valid premultiplied data; storage drops it.
        let live = PixelBuffer::filled(2, 2, [10, 20, 30, 0]);
        let normalized = PngCodec.reencode(&live).unwrap();
        assert_eq!(normalized, PixelBuffer::filled(2, 2, [0, 0, 0, 0]));
    }
}
