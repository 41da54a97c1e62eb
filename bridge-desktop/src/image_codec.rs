//! Image Codec Implementation using the `image` crate

use bridge_traits::{
    error::{BridgeError, Result},
    image::{EncodeFormat, ImageCodec, PixelBuffer, ScaleFilter},
};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Pure-Rust codec backed by `image`.
///
/// Every method is synchronous and thread-safe, so the core may call it from
/// any blocking worker.
#[derive(Debug, Default, Clone)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    pub fn new() -> Self {
        Self
    }

    fn to_image(buffer: &PixelBuffer) -> Result<RgbaImage> {
        RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.as_bytes().to_vec())
            .ok_or_else(|| BridgeError::InvalidInput("pixel buffer size mismatch".to_string()))
    }

    fn from_image(image: RgbaImage) -> Result<PixelBuffer> {
        let (width, height) = image.dimensions();
        PixelBuffer::from_rgba(width, height, image.into_raw())
    }
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer> {
        let img = image::load_from_memory(data).map_err(|e| BridgeError::Decode(e.to_string()))?;
        debug!(width = img.width(), height = img.height(), "Decoded image");
        Self::from_image(img.to_rgba8())
    }

    fn encode(&self, buffer: &PixelBuffer, format: EncodeFormat) -> Result<Bytes> {
        let rgba = Self::to_image(buffer)?;
        let mut out = Vec::new();

        match format {
            EncodeFormat::Jpeg { quality } => {
                let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
                encoder
                    .encode(
                        rgb.as_raw(),
                        rgb.width(),
                        rgb.height(),
                        image::ExtendedColorType::Rgb8,
                    )
                    .map_err(|e| BridgeError::Encode(e.to_string()))?;
            }
            EncodeFormat::Png => {
                rgba.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
                    .map_err(|e| BridgeError::Encode(e.to_string()))?;
            }
        }

        Ok(Bytes::from(out))
    }

    fn scale(&self, buffer: &PixelBuffer, width: u32, height: u32, filter: ScaleFilter) -> Result<PixelBuffer> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidInput(format!(
                "cannot scale to {}x{}",
                width, height
            )));
        }
        if buffer.dimensions() == (width, height) {
            return Ok(buffer.clone());
        }

        let filter = match filter {
            ScaleFilter::Bilinear => FilterType::Triangle,
            ScaleFilter::Nearest => FilterType::Nearest,
        };
        let src = Self::to_image(buffer)?;
        Self::from_image(imageops::resize(&src, width, height, filter))
    }

    fn crop(&self, buffer: &PixelBuffer, x: u32, y: u32, width: u32, height: u32) -> Result<PixelBuffer> {
        let in_bounds = width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|r| r <= buffer.width())
            && y.checked_add(height).is_some_and(|b| b <= buffer.height());
        if !in_bounds {
            return Err(BridgeError::InvalidInput(format!(
                "crop {}x{}+{}+{} outside {}x{}",
                width,
                height,
                x,
                y,
                buffer.width(),
                buffer.height()
            )));
        }

        let src = Self::to_image(buffer)?;
        Self::from_image(imageops::crop_imm(&src, x, y, width, height).to_image())
    }

    fn gaussian_blur(&self, buffer: &PixelBuffer, radius: u32) -> Result<PixelBuffer> {
        if radius == 0 {
            return Ok(buffer.clone());
        }
        let src = Self::to_image(buffer)?;
        // `radius` is the standard deviation of the kernel.
        Self::from_image(imageops::blur(&src, radius as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(width: u32, height: u32) -> PixelBuffer {
        let mut buffer = PixelBuffer::filled(width, height, [255, 255, 255, 255]);
        for y in 0..height {
            for x in 0..width {
                if (x + y) % 2 == 0 {
                    buffer.set_pixel(x, y, [0, 0, 0, 255]);
                }
            }
        }
        buffer
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let codec = ImageRsCodec::new();
        let original = checkerboard(8, 6);

        let encoded = codec.encode(&original, EncodeFormat::Png).unwrap();
        let decoded = codec.decode(&encoded).unwrap();

        assert_eq!(decoded, original);
    }

    #[test]
    fn test_jpeg_encode_keeps_dimensions() {
        let codec = ImageRsCodec::new();
        let original = PixelBuffer::filled(40, 20, [200, 10, 10, 255]);

        let encoded = codec
            .encode(&original, EncodeFormat::Jpeg { quality: 90 })
            .unwrap();
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (40, 20));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = ImageRsCodec::new();
        let err = codec.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn test_scale_and_crop() {
        let codec = ImageRsCodec::new();
        let original = checkerboard(100, 50);

        let scaled = codec.scale(&original, 20, 10, ScaleFilter::Bilinear).unwrap();
        assert_eq!(scaled.dimensions(), (20, 10));

        let nearest = codec.scale(&original, 7, 3, ScaleFilter::Nearest).unwrap();
        assert_eq!(nearest.dimensions(), (7, 3));

        let cropped = codec.crop(&original, 25, 0, 50, 50).unwrap();
        assert_eq!(cropped.dimensions(), (50, 50));
        assert_eq!(cropped.pixel(0, 0), original.pixel(25, 0));

        assert!(codec.crop(&original, 60, 0, 50, 50).is_err());
        assert!(codec.scale(&original, 0, 10, ScaleFilter::Bilinear).is_err());
    }

    #[test]
    fn test_blur_smooths_checkerboard() {
        let codec = ImageRsCodec::new();
        let original = checkerboard(32, 32);

        let blurred = codec.gaussian_blur(&original, 25).unwrap();
        assert_eq!(blurred.dimensions(), (32, 32));

        let [r, _, _, _] = blurred.pixel(16, 16).unwrap();
        assert!(r > 60 && r < 195, "center should be grey, got {}", r);
    }

    #[test]
    fn test_blur_radius_is_standard_deviation() {
        let codec = ImageRsCodec::new();
        let mut edge = PixelBuffer::filled(32, 32, [0, 0, 0, 255]);
        for y in 0..32 {
            for x in 16..32 {
                edge.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }

        // One sigma from the edge a Gaussian leaves about 16% of the step.
        let blurred = codec.gaussian_blur(&edge, 4).unwrap();
        let [r, _, _, _] = blurred.pixel(12, 16).unwrap();
        assert!(r > 15 && r < 100, "expected a soft edge, got {}", r);
    }
}
