//! Transform Pipeline
//!
//! Callers describe a rendition with a bit-set of [`ArtBehaviour`] flags.
//! The bits are validated once into [`TransformFlags`] so the rest of the
//! crate works with enums instead of raw integers.
//!
//! Order of operations is fixed: crop first, then either a bilinear fit or a
//! nearest-neighbour fit followed by a Gaussian blur.

use bridge_traits::image::{ImageCodec, PixelBuffer, ScaleFilter};

use crate::error::{ArtworkError, Result};

/// Flag bits accepted at the service boundary.
#[derive(Debug, Clone, Copy)]
pub struct ArtBehaviour;

impl ArtBehaviour {
    pub const NONE: u32 = 0;
    /// Crop to the requested aspect ratio, centered.
    pub const CROP: u32 = 1 << 0;
    /// Crop to a centered square.
    pub const CROP_SQUARE: u32 = 1 << 1;
    pub const BLUR: u32 = 1 << 2;
    pub const BLUR_HARD: u32 = 1 << 3;
    pub const BLUR_MAX: u32 = 1 << 4;
    /// Persist the rendition in the derived cache.
    pub const WRITE_THROUGH: u32 = 1 << 5;
    /// Ignore any existing derived entry.
    pub const SKIP_CACHE_READ: u32 = 1 << 6;

    const ALL: u32 = Self::CROP
        | Self::CROP_SQUARE
        | Self::BLUR
        | Self::BLUR_HARD
        | Self::BLUR_MAX
        | Self::WRITE_THROUGH
        | Self::SKIP_CACHE_READ;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    #[default]
    None,
    Ratio,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlurStrength {
    #[default]
    None,
    Light,
    Hard,
    Max,
}

impl BlurStrength {
    /// Gaussian radius in pixels.
    pub fn radius(&self) -> u32 {
        match self {
            BlurStrength::None => 0,
            BlurStrength::Light => 25,
            BlurStrength::Hard => 50,
            BlurStrength::Max => 100,
        }
    }
}

/// Validated transform request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformFlags {
    pub crop: CropMode,
    pub blur: BlurStrength,
    pub write_through: bool,
    pub skip_cache_read: bool,
}

impl TransformFlags {
    /// Parse a flag bit-set.
    ///
    /// Rejects unknown bits, more than one blur strength, and `CROP` combined
    /// with `CROP_SQUARE`.
    pub fn from_bits(bits: u32) -> Result<Self> {
        let unknown = bits & !ArtBehaviour::ALL;
        if unknown != 0 {
            return Err(ArtworkError::InvalidTransformCombination(format!(
                "unknown flag bits {:#x}",
                unknown
            )));
        }

        let crop = match (bits & ArtBehaviour::CROP != 0, bits & ArtBehaviour::CROP_SQUARE != 0) {
            (false, false) => CropMode::None,
            (true, false) => CropMode::Ratio,
            (false, true) => CropMode::Square,
            (true, true) => {
                return Err(ArtworkError::InvalidTransformCombination(
                    "CROP and CROP_SQUARE are exclusive".to_string(),
                ))
            }
        };

        let blur_bits = bits & (ArtBehaviour::BLUR | ArtBehaviour::BLUR_HARD | ArtBehaviour::BLUR_MAX);
        let blur = match blur_bits {
            0 => BlurStrength::None,
            ArtBehaviour::BLUR => BlurStrength::Light,
            ArtBehaviour::BLUR_HARD => BlurStrength::Hard,
            ArtBehaviour::BLUR_MAX => BlurStrength::Max,
            _ => {
                return Err(ArtworkError::InvalidTransformCombination(
                    "only one blur strength may be requested".to_string(),
                ))
            }
        };

        Ok(Self {
            crop,
            blur,
            write_through: bits & ArtBehaviour::WRITE_THROUGH != 0,
            skip_cache_read: bits & ArtBehaviour::SKIP_CACHE_READ != 0,
        })
    }

    pub fn bits(&self) -> u32 {
        let mut bits = match self.crop {
            CropMode::None => 0,
            CropMode::Ratio => ArtBehaviour::CROP,
            CropMode::Square => ArtBehaviour::CROP_SQUARE,
        };
        bits |= match self.blur {
            BlurStrength::None => 0,
            BlurStrength::Light => ArtBehaviour::BLUR,
            BlurStrength::Hard => ArtBehaviour::BLUR_HARD,
            BlurStrength::Max => ArtBehaviour::BLUR_MAX,
        };
        if self.write_through {
            bits |= ArtBehaviour::WRITE_THROUGH;
        }
        if self.skip_cache_read {
            bits |= ArtBehaviour::SKIP_CACHE_READ;
        }
        bits
    }

    pub fn with_crop(mut self, crop: CropMode) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_blur(mut self, blur: BlurStrength) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self
    }

    pub fn with_skip_cache_read(mut self, enabled: bool) -> Self {
        self.skip_cache_read = enabled;
        self
    }

    /// Light and hard blurs without crop or persistence are rendered from a
    /// fixed-size plain entry instead of one entry per requested size.
    pub fn uses_banner_source(&self) -> bool {
        matches!(self.blur, BlurStrength::Light | BlurStrength::Hard)
            && self.crop == CropMode::None
            && !self.write_through
    }

    /// Category segment for the derived cache key, e.g. `ALBUM_SQUARE_BLUR_HARD`.
    pub fn category_segment(&self, prefix: &str) -> String {
        let mut segment = prefix.to_string();
        match self.crop {
            CropMode::None => {}
            CropMode::Ratio => segment.push_str("_CROP"),
            CropMode::Square => segment.push_str("_SQUARE"),
        }
        match self.blur {
            BlurStrength::None => {}
            BlurStrength::Light => segment.push_str("_BLUR_LIGHT"),
            BlurStrength::Hard => segment.push_str("_BLUR_HARD"),
            BlurStrength::Max => segment.push_str("_BLUR_MAX"),
        }
        segment
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Region to keep when cropping a `src_width` x `src_height` image for a
/// `want_width` x `want_height` target. `None` when no crop is needed.
pub fn crop_rect(
    src_width: u32,
    src_height: u32,
    mode: CropMode,
    want_width: u32,
    want_height: u32,
) -> Option<CropRect> {
    if src_width == 0 || src_height == 0 {
        return None;
    }

    match mode {
        CropMode::None => None,
        CropMode::Square => {
            if src_width == src_height {
                return None;
            }
            let side = src_width.min(src_height);
            Some(CropRect {
                x: (src_width - side) / 2,
                y: (src_height - side) / 2,
                width: side,
                height: side,
            })
        }
        CropMode::Ratio => {
            if want_width == 0 || want_height == 0 {
                return None;
            }
            let aspect = src_width as f64 / src_height as f64;
            let wanted = want_width as f64 / want_height as f64;

            if aspect > wanted {
                let width = ((src_height as f64 * wanted).round() as u32).clamp(1, src_width);
                if width == src_width {
                    return None;
                }
                Some(CropRect {
                    x: (src_width - width) / 2,
                    y: 0,
                    width,
                    height: src_height,
                })
            } else if aspect < wanted {
                let height = ((src_width as f64 / wanted).round() as u32).clamp(1, src_height);
                if height == src_height {
                    return None;
                }
                Some(CropRect {
                    x: 0,
                    y: (src_height - height) / 2,
                    width: src_width,
                    height,
                })
            } else {
                None
            }
        }
    }
}

/// Run the full pipeline on a decoded source.
pub fn apply(
    codec: &dyn ImageCodec,
    source: &PixelBuffer,
    width: u32,
    height: u32,
    flags: &TransformFlags,
) -> Result<PixelBuffer> {
    let (src_width, src_height) = source.dimensions();

    let cropped = match crop_rect(src_width, src_height, flags.crop, width, height) {
        Some(rect) => Some(
            codec
                .crop(source, rect.x, rect.y, rect.width, rect.height)
                .map_err(|e| ArtworkError::TransformFailed(format!("crop: {}", e)))?,
        ),
        None => None,
    };
    let current = cropped.as_ref().unwrap_or(source);

    match flags.blur {
        BlurStrength::None => fit(codec, current, width, height),
        strength => blur_to(codec, current, width, height, strength),
    }
}

/// Bilinear fit to exactly `width` x `height`.
pub fn fit(codec: &dyn ImageCodec, source: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if source.dimensions() == (width, height) {
        return Ok(source.clone());
    }
    codec
        .scale(source, width, height, ScaleFilter::Bilinear)
        .map_err(|e| ArtworkError::TransformFailed(format!("scale: {}", e)))
}

/// Nearest-neighbour fit followed by a blur at the strength's radius.
pub fn blur_to(
    codec: &dyn ImageCodec,
    source: &PixelBuffer,
    width: u32,
    height: u32,
    strength: BlurStrength,
) -> Result<PixelBuffer> {
    let scaled = codec
        .scale(source, width, height, ScaleFilter::Nearest)
        .map_err(|e| ArtworkError::TransformFailed(format!("scale: {}", e)))?;

    match strength.radius() {
        0 => Ok(scaled),
        radius => codec
            .gaussian_blur(&scaled, radius)
            .map_err(|e| ArtworkError::TransformFailed(format!("blur: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::image::EncodeFormat;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Records the calls it receives and fakes every operation by allocating
    /// a buffer of the right size.
    #[derive(Default)]
    struct RecordingCodec {
        calls: Mutex<Vec<String>>,
        fail_blur: bool,
    }

    impl RecordingCodec {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageCodec for RecordingCodec {
        fn decode(&self, _data: &[u8]) -> bridge_traits::error::Result<PixelBuffer> {
            unreachable!()
        }

        fn encode(&self, _buffer: &PixelBuffer, _format: EncodeFormat) -> bridge_traits::error::Result<Bytes> {
            unreachable!()
        }

        fn scale(
            &self,
            _buffer: &PixelBuffer,
            width: u32,
            height: u32,
            filter: ScaleFilter,
        ) -> bridge_traits::error::Result<PixelBuffer> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("scale {:?} {}x{}", filter, width, height));
            Ok(PixelBuffer::filled(width, height, [0, 0, 0, 255]))
        }

        fn crop(
            &self,
            _buffer: &PixelBuffer,
            x: u32,
            y: u32,
            width: u32,
            height: u32,
        ) -> bridge_traits::error::Result<PixelBuffer> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("crop {},{} {}x{}", x, y, width, height));
            Ok(PixelBuffer::filled(width, height, [0, 0, 0, 255]))
        }

        fn gaussian_blur(&self, buffer: &PixelBuffer, radius: u32) -> bridge_traits::error::Result<PixelBuffer> {
            if self.fail_blur {
                return Err(BridgeError::OperationFailed("blur".to_string()));
            }
            self.calls.lock().unwrap().push(format!("blur {}", radius));
            Ok(buffer.clone())
        }
    }

    #[test]
    fn test_from_bits_rejects_multiple_blurs() {
        let result = TransformFlags::from_bits(ArtBehaviour::BLUR | ArtBehaviour::BLUR_MAX);
        assert!(matches!(result, Err(ArtworkError::InvalidTransformCombination(_))));
    }

    #[test]
    fn test_from_bits_rejects_both_crops() {
        let result = TransformFlags::from_bits(ArtBehaviour::CROP | ArtBehaviour::CROP_SQUARE);
        assert!(matches!(result, Err(ArtworkError::InvalidTransformCombination(_))));
    }

    #[test]
    fn test_from_bits_rejects_unknown_bits() {
        assert!(TransformFlags::from_bits(1 << 20).is_err());
    }

    #[test]
    fn test_bits_round_trip() {
        let bits = ArtBehaviour::CROP_SQUARE | ArtBehaviour::BLUR_HARD | ArtBehaviour::WRITE_THROUGH;
        let flags = TransformFlags::from_bits(bits).unwrap();

        assert_eq!(flags.crop, CropMode::Square);
        assert_eq!(flags.blur, BlurStrength::Hard);
        assert!(flags.write_through);
        assert!(!flags.skip_cache_read);
        assert_eq!(flags.bits(), bits);
    }

    #[test]
    fn test_banner_source_selection() {
        let light = TransformFlags::default().with_blur(BlurStrength::Light);
        assert!(light.uses_banner_source());
        assert!(TransformFlags::default().with_blur(BlurStrength::Hard).uses_banner_source());
        assert!(!TransformFlags::default().with_blur(BlurStrength::Max).uses_banner_source());
        assert!(!light.with_write_through(true).uses_banner_source());
        assert!(!light.with_crop(CropMode::Square).uses_banner_source());
        assert!(!TransformFlags::default().uses_banner_source());
    }

    #[test]
    fn test_category_segment() {
        assert_eq!(TransformFlags::default().category_segment("ALBUM"), "ALBUM");
        let flags = TransformFlags::default()
            .with_crop(CropMode::Square)
            .with_blur(BlurStrength::Max);
        assert_eq!(flags.category_segment("ARTIST"), "ARTIST_SQUARE_BLUR_MAX");
        assert_eq!(
            TransformFlags::default().with_crop(CropMode::Ratio).category_segment("WEB"),
            "WEB_CROP"
        );
    }

    #[test]
    fn test_square_crop_centers_longer_axis() {
        assert_eq!(
            crop_rect(300, 200, CropMode::Square, 50, 50),
            Some(CropRect { x: 50, y: 0, width: 200, height: 200 })
        );
        assert_eq!(
            crop_rect(200, 301, CropMode::Square, 50, 50),
            Some(CropRect { x: 0, y: 50, width: 200, height: 200 })
        );
        assert_eq!(crop_rect(200, 200, CropMode::Square, 50, 50), None);
    }

    #[test]
    fn test_ratio_crop() {
        // 400x100 source into a 2:1 target keeps 200 columns from x = 100.
        assert_eq!(
            crop_rect(400, 100, CropMode::Ratio, 20, 10),
            Some(CropRect { x: 100, y: 0, width: 200, height: 100 })
        );
        // Too tall: 100x400 into 1:1 keeps 100 rows from y = 150.
        assert_eq!(
            crop_rect(100, 400, CropMode::Ratio, 10, 10),
            Some(CropRect { x: 0, y: 150, width: 100, height: 100 })
        );
        assert_eq!(crop_rect(300, 150, CropMode::Ratio, 600, 300), None);
        assert_eq!(crop_rect(300, 150, CropMode::None, 10, 10), None);
    }

    #[test]
    fn test_apply_plain_uses_bilinear() {
        let codec = RecordingCodec::default();
        let source = PixelBuffer::filled(40, 20, [1, 2, 3, 255]);

        let out = apply(&codec, &source, 10, 10, &TransformFlags::default()).unwrap();

        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(codec.calls(), vec!["scale Bilinear 10x10"]);
    }

    #[test]
    fn test_apply_crop_then_blur() {
        let codec = RecordingCodec::default();
        let source = PixelBuffer::filled(40, 20, [1, 2, 3, 255]);
        let flags = TransformFlags::default()
            .with_crop(CropMode::Square)
            .with_blur(BlurStrength::Max);

        let out = apply(&codec, &source, 8, 8, &flags).unwrap();

        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(
            codec.calls(),
            vec!["crop 10,0 20x20", "scale Nearest 8x8", "blur 100"]
        );
    }

    #[test]
    fn test_apply_skips_scale_at_target_size() {
        let codec = RecordingCodec::default();
        let source = PixelBuffer::filled(10, 10, [1, 2, 3, 255]);

        let out = apply(&codec, &source, 10, 10, &TransformFlags::default()).unwrap();

        assert_eq!(out, source);
        assert!(codec.calls().is_empty());
    }

    #[test]
    fn test_transform_failure_is_reported() {
        let codec = RecordingCodec {
            fail_blur: true,
            ..Default::default()
        };
        let source = PixelBuffer::filled(10, 10, [1, 2, 3, 255]);
        let flags = TransformFlags::default().with_blur(BlurStrength::Light);

        let result = apply(&codec, &source, 5, 5, &flags);
        assert!(matches!(result, Err(ArtworkError::TransformFailed(_))));
    }
}
