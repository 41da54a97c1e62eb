//! Cache key encoding
//!
//! Derived entries live in one flat directory under names of the form
//! `@<category>@<digest>_<width>_<height>.<ext>`. The raw identity name never
//! reaches the filesystem; only its digest does.

use bridge_traits::image::EncodeFormat;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Number of hex characters kept from the SHA-256 output (128 bits).
pub const DIGEST_HEX_LEN: usize = 32;

/// Stable digest of an identity name.
pub fn digest(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(DIGEST_HEX_LEN);
    hex
}

/// Fully resolved derived cache key. Dimensions are device pixels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub digest: String,
    pub segment: String,
    pub width: u32,
    pub height: u32,
}

impl CacheKey {
    pub fn new(name: &str, segment: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            digest: digest(name),
            segment: segment.into(),
            width,
            height,
        }
    }

    /// Whether this key belongs to the transform family of `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        segment_has_prefix(&self.segment, prefix)
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "@{}@{}_{}_{}.{}",
            self.segment, self.digest, self.width, self.height, extension
        )
    }
}

/// Components recovered from a derived cache filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub segment: String,
    pub digest: String,
    pub width: u32,
    pub height: u32,
    pub extension: String,
}

impl ParsedKey {
    /// Whether this entry belongs to the transform family of `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        segment_has_prefix(&self.segment, prefix)
    }
}

/// `ALBUM_SQUARE` belongs to `ALBUM`; `ALBUMS` would not.
fn segment_has_prefix(segment: &str, prefix: &str) -> bool {
    segment == prefix
        || segment
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Maps cache keys to paths inside the derived cache directory.
#[derive(Debug, Clone)]
pub struct CacheKeyEncoder {
    root: PathBuf,
    lossless: bool,
}

impl CacheKeyEncoder {
    /// `lossless` switches every entry to PNG.
    pub fn new(root: impl Into<PathBuf>, lossless: bool) -> Self {
        Self {
            root: root.into(),
            lossless,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `name` under the category segment at the given
    /// device dimensions.
    pub fn encode(&self, name: &str, segment: &str, width: u32, height: u32) -> PathBuf {
        self.path_for(&CacheKey::new(name, segment, width, height))
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name(self.extension_for(&key.segment)))
    }

    /// Composites keep their transparent corners, so they are always PNG.
    pub fn extension_for(&self, segment: &str) -> &'static str {
        self.format_for(segment, 100).extension()
    }

    pub fn format_for(&self, segment: &str, quality: u8) -> EncodeFormat {
        if segment_has_prefix(segment, "ROUNDED") || self.lossless {
            EncodeFormat::Png
        } else {
            EncodeFormat::Jpeg { quality }
        }
    }

    /// Recover the key components from a filename. Returns `None` for
    /// anything this encoder would not have produced.
    pub fn parse(file_name: &str) -> Option<ParsedKey> {
        let rest = file_name.strip_prefix('@')?;
        let (segment, rest) = rest.split_once('@')?;
        let (stem, extension) = rest.rsplit_once('.')?;

        let mut parts = stem.rsplitn(3, '_');
        let height = parts.next()?.parse().ok()?;
        let width = parts.next()?.parse().ok()?;
        let digest = parts.next()?;

        if segment.is_empty()
            || digest.len() != DIGEST_HEX_LEN
            || !digest.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }

        Some(ParsedKey {
            segment: segment.to_string(),
            digest: digest.to_string(),
            width,
            height,
            extension: extension.to_string(),
        })
    }

    /// Whether `file_name` is a rendition of the identity with this digest
    /// under `prefix`, in any transform class and size.
    pub fn matches_identity(file_name: &str, prefix: &str, digest: &str) -> bool {
        Self::parse(file_name).is_some_and(|key| key.digest == digest && key.has_prefix(prefix))
    }

    /// File name of a canonical store entry.
    pub fn canonical_file_name(name: &str, extension: &str) -> String {
        format!("{}.{}", digest(name), extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_128_bits() {
        let d = digest("Miles Davis - Kind of Blue");
        assert_eq!(d.len(), DIGEST_HEX_LEN);
        assert_eq!(d, digest("Miles Davis - Kind of Blue"));
        assert_ne!(d, digest("Miles Davis - Kind of Blue "));
    }

    #[test]
    fn test_encode_is_deterministic_and_distinct() {
        let encoder = CacheKeyEncoder::new("/cache", false);
        let a = encoder.encode("Blue Train", "ALBUM", 200, 200);
        assert_eq!(a, encoder.encode("Blue Train", "ALBUM", 200, 200));
        assert_ne!(a, encoder.encode("Blue Train", "ALBUM", 400, 400));
        assert_ne!(a, encoder.encode("Blue Train", "ARTIST", 200, 200));
        assert_ne!(a, encoder.encode("Blue Train", "ALBUM", 200, 100));
    }

    #[test]
    fn test_encode_never_embeds_raw_name() {
        let encoder = CacheKeyEncoder::new("/cache", false);
        let path = encoder.encode("AC/DC: Back in Black", "ALBUM", 100, 100);
        let file_name = path.file_name().unwrap().to_str().unwrap();

        assert_eq!(path.parent(), Some(Path::new("/cache")));
        assert!(!file_name.contains("AC"));
        assert!(file_name.starts_with("@ALBUM@"));
        assert!(file_name.ends_with("_100_100.jpg"));
    }

    #[test]
    fn test_extension_selection() {
        let lossy = CacheKeyEncoder::new("/cache", false);
        assert_eq!(lossy.extension_for("ALBUM"), "jpg");
        assert_eq!(lossy.extension_for("ROUNDED"), "png");
        assert_eq!(lossy.extension_for("ROUNDED_SQUARE"), "png");
        assert_eq!(lossy.format_for("ARTIST", 85), EncodeFormat::Jpeg { quality: 85 });

        let lossless = CacheKeyEncoder::new("/cache", true);
        assert_eq!(lossless.extension_for("ALBUM"), "png");
    }

    #[test]
    fn test_parse() {
        let name = CacheKey::new("x", "ALBUM_SQUARE_BLUR_HARD", 640, 360).file_name("jpg");
        let parsed = CacheKeyEncoder::parse(&name).unwrap();

        assert_eq!(parsed.segment, "ALBUM_SQUARE_BLUR_HARD");
        assert_eq!(parsed.digest, digest("x"));
        assert_eq!((parsed.width, parsed.height), (640, 360));
        assert_eq!(parsed.extension, "jpg");

        assert!(CacheKeyEncoder::parse("cover.jpg").is_none());
        assert!(CacheKeyEncoder::parse("@ALBUM@nothex_1_1.jpg").is_none());
        assert!(CacheKeyEncoder::parse(".@ALBUM@tmp.tmp").is_none());
    }

    #[test]
    fn test_matches_identity() {
        let d = digest("Giant Steps");
        let plain = CacheKey::new("Giant Steps", "ALBUM", 50, 50).file_name("jpg");
        let blurred = CacheKey::new("Giant Steps", "ALBUM_BLUR_MAX", 50, 50).file_name("jpg");
        let other = CacheKey::new("Giant Steps", "ARTIST", 50, 50).file_name("jpg");

        assert!(CacheKeyEncoder::matches_identity(&plain, "ALBUM", &d));
        assert!(CacheKeyEncoder::matches_identity(&blurred, "ALBUM", &d));
        assert!(!CacheKeyEncoder::matches_identity(&other, "ALBUM", &d));
        assert!(!CacheKeyEncoder::matches_identity(&plain, "ALBUM", &digest("Blue Train")));
    }
}
