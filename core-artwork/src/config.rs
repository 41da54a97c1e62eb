//! Artwork subsystem configuration

use bridge_traits::image::EncodeFormat;
use core_runtime::config::CoreConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Smallest and largest accepted cover size; anything else falls back to
/// [`SizeTiers::DEFAULT_BIG`].
pub const MIN_COVER_SIZE: u32 = 50;
pub const MAX_COVER_SIZE: u32 = 400;

/// Logical sizes used by the presentation layer, all derived from the big
/// cover size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeTiers {
    pub big: u32,
    pub banner: u32,
    pub medium: u32,
    pub small: u32,
}

impl SizeTiers {
    pub const DEFAULT_BIG: u32 = 200;

    pub fn from_big(big: u32) -> Self {
        let big = if (MIN_COVER_SIZE..=MAX_COVER_SIZE).contains(&big) {
            big
        } else {
            Self::DEFAULT_BIG
        };

        Self {
            big,
            banner: big * 150 / 200,
            medium: big * 100 / 200,
            small: big * 50 / 200,
        }
    }
}

impl Default for SizeTiers {
    fn default() -> Self {
        Self::from_big(Self::DEFAULT_BIG)
    }
}

/// Maximum file age per directory before the sweeper deletes it.
///
/// Auto-downloaded art is trusted for less time than user-supplied art.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub derived: Duration,
    pub albums: Duration,
    pub artists: Duration,
    pub web: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            derived: YEAR,
            albums: YEAR * 3,
            artists: YEAR * 3,
            web: YEAR,
        }
    }
}

/// Configuration for the artwork subsystem.
#[derive(Debug, Clone)]
pub struct ArtworkConfig {
    /// Encoder quality 1..=100; 100 switches every file to PNG (default: 90)
    pub quality: u8,

    /// Logical size tiers (default: derived from 200)
    pub tiers: SizeTiers,

    /// Byte budget for decoded renditions kept in memory (default: 64MB)
    pub memory_cache_bytes: usize,

    /// Decode/transform/encode jobs allowed on the blocking pool at once
    pub max_concurrent_transforms: usize,

    /// Remote lookups allowed at once (default: 2)
    pub max_concurrent_downloads: usize,

    /// Flat derived cache directory
    pub cache_root: PathBuf,

    /// Parent of the canonical store directories
    pub data_root: PathBuf,

    pub retention: RetentionConfig,

    /// Queue a download when a lookup finds no canonical source
    pub remote_lookups: bool,
}

impl Default for ArtworkConfig {
    fn default() -> Self {
        Self {
            quality: 90,
            tiers: SizeTiers::default(),
            memory_cache_bytes: 64 * 1024 * 1024, // 64MB
            max_concurrent_transforms: 4,
            max_concurrent_downloads: 2,
            cache_root: PathBuf::from("cache").join("artwork"),
            data_root: PathBuf::from("data").join("artwork"),
            retention: RetentionConfig::default(),
            remote_lookups: false,
        }
    }
}

impl ArtworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the artwork configuration from the validated core configuration.
    pub fn from_core(core: &CoreConfig) -> Self {
        Self {
            quality: core.cover_quality,
            tiers: SizeTiers::from_big(core.cover_size),
            memory_cache_bytes: core.memory_cache_mb * 1024 * 1024,
            max_concurrent_transforms: core.max_concurrent_transforms,
            cache_root: core.cache_dir.join("artwork"),
            data_root: core.data_dir.join("artwork"),
            remote_lookups: core.features.enable_artwork_remote && core.downloader.is_some(),
            ..Self::default()
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_cover_size(mut self, big: u32) -> Self {
        self.tiers = SizeTiers::from_big(big);
        self
    }

    pub fn with_memory_cache_bytes(mut self, bytes: usize) -> Self {
        self.memory_cache_bytes = bytes;
        self
    }

    pub fn with_max_concurrent_transforms(mut self, count: usize) -> Self {
        self.max_concurrent_transforms = count;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    pub fn with_cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = path.into();
        self
    }

    pub fn with_data_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_root = path.into();
        self
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_remote_lookups(mut self, enabled: bool) -> Self {
        self.remote_lookups = enabled;
        self
    }

    /// Quality 100 means every file is stored as PNG.
    pub fn lossless(&self) -> bool {
        self.quality >= 100
    }

    /// Container used for canonical files.
    pub fn store_format(&self) -> EncodeFormat {
        if self.lossless() {
            EncodeFormat::Png
        } else {
            EncodeFormat::Jpeg {
                quality: self.quality,
            }
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.quality == 0 || self.quality > 100 {
            return Err(format!("quality must be in 1..=100, got {}", self.quality));
        }

        if self.max_concurrent_transforms == 0 {
            return Err("max_concurrent_transforms must be at least 1".to_string());
        }

        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.cache_root.as_os_str().is_empty() {
            return Err("cache_root cannot be empty".to_string());
        }

        if self.data_root.as_os_str().is_empty() {
            return Err("data_root cannot be empty".to_string());
        }

        if self.cache_root == self.data_root {
            return Err("cache_root and data_root must differ".to_string());
        }

        let retention = &self.retention;
        for (label, age) in [
            ("derived", retention.derived),
            ("albums", retention.albums),
            ("artists", retention.artists),
            ("web", retention.web),
        ] {
            if age < DAY {
                return Err(format!("{} retention must be at least one day", label));
            }
        }

        Ok(())
    }
}
