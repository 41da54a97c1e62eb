//! Image Codec Abstractions
//!
//! The core never decodes or resamples pixels itself. Hosts inject an
//! [`ImageCodec`] and the core moves [`PixelBuffer`] values between it, the
//! cache and the disk.

use bytes::Bytes;

use crate::error::{BridgeError, Result};

/// Bytes per pixel of a [`PixelBuffer`] (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

/// Decoded raster image in straight-alpha RGBA8, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Wrap raw RGBA8 pixels. Fails when the length does not match the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(BridgeError::InvalidInput(format!(
                "pixel data is {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Buffer of the given size where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * BYTES_PER_PIXEL);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Memory held by the pixel data.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x < self.width && y < self.height {
            let i = self.offset(x, y);
            self.pixels[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgba);
        }
    }

    /// Copy `src` onto this buffer with its top-left corner at (`x`, `y`).
    ///
    /// Rows and columns falling outside this buffer are clipped.
    pub fn blit(&mut self, src: &PixelBuffer, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_w = src.width.min(self.width - x) as usize;
        let copy_h = src.height.min(self.height - y);
        for row in 0..copy_h {
            let dst_start = self.offset(x, y + row);
            let src_start = src.offset(0, row);
            let len = copy_w * BYTES_PER_PIXEL;
            self.pixels[dst_start..dst_start + len]
                .copy_from_slice(&src.pixels[src_start..src_start + len]);
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }
}

/// Output container for [`ImageCodec::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    /// Lossy JPEG, quality 1..=100. Alpha is discarded.
    Jpeg { quality: u8 },
    /// Lossless PNG with alpha.
    Png,
}

impl EncodeFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            EncodeFormat::Jpeg { .. } => "jpg",
            EncodeFormat::Png => "png",
        }
    }
}

/// Resampling filter for [`ImageCodec::scale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleFilter {
    Bilinear,
    Nearest,
}

/// Image codec trait
///
/// Implementations must be safe to call from any worker thread. Callers run
/// these methods on blocking threads, so they are synchronous.
pub trait ImageCodec: Send + Sync {
    /// Decode JPEG/PNG (or any supported container) into RGBA8.
    fn decode(&self, data: &[u8]) -> Result<PixelBuffer>;

    /// Encode a buffer into the requested container.
    fn encode(&self, buffer: &PixelBuffer, format: EncodeFormat) -> Result<Bytes>;

    /// Resample to exactly `width` x `height`.
    fn scale(&self, buffer: &PixelBuffer, width: u32, height: u32, filter: ScaleFilter) -> Result<PixelBuffer>;

    /// Extract the sub-rectangle at (`x`, `y`) of size `width` x `height`.
    fn crop(&self, buffer: &PixelBuffer, x: u32, y: u32, width: u32, height: u32) -> Result<PixelBuffer>;

    /// Gaussian blur; `radius` is the standard deviation in pixels.
    fn gaussian_blur(&self, buffer: &PixelBuffer, radius: u32) -> Result<PixelBuffer>;
}
