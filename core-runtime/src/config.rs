//! # Core Configuration Module
//!
//! Provides configuration management for the artwork core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all bridges and settings the core needs. It enforces
//! fail-fast validation so that a missing capability is reported at startup
//! rather than on the first artwork request.
//!
//! ## Required Settings
//!
//! - `cache_dir` - Root for regenerable derived artwork
//! - `data_dir` - Root for canonical artwork
//!
//! ## Bridges (with platform defaults)
//!
//! - `FileSystemAccess` - File I/O (desktop default: tokio fs)
//! - `ImageCodec` - Pixel decode/encode/transform (desktop default: `image` crate)
//! - `Clock` - Time source for retention sweeps (default: system clock)
//! - `ArtworkDownloader` - Remote artwork lookup (optional, no default)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `FileSystemAccess` and `ImageCodec` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .data_dir("/path/to/data")
//!     .cover_quality(85)
//!     .cover_size(300)
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{ArtworkDownloader, Clock, FileSystemAccess, ImageCodec, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;

/// Default JPEG quality for stored artwork.
pub const DEFAULT_COVER_QUALITY: u8 = 90;

/// Default base ("big") artwork edge in logical pixels.
pub const DEFAULT_COVER_SIZE: u32 = 200;

/// Default decoded-artwork memory budget.
pub const DEFAULT_MEMORY_CACHE_MB: usize = 64;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Core configuration for the artwork core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Directory for regenerable files (derived artwork renditions)
    pub cache_dir: PathBuf,

    /// Directory for persistent files (canonical artwork)
    pub data_dir: PathBuf,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Image codec used for every pixel operation
    pub image_codec: Arc<dyn ImageCodec>,

    /// Remote artwork lookup (optional)
    pub downloader: Option<Arc<dyn ArtworkDownloader>>,

    /// Time source for retention decisions
    pub clock: Arc<dyn Clock>,

    /// JPEG quality (1..=100). 100 switches storage to lossless PNG.
    pub cover_quality: u8,

    /// Base artwork edge as configured by the user, before clamping
    pub cover_size: u32,

    /// Decoded-artwork memory budget in megabytes
    pub memory_cache_mb: usize,

    /// Upper bound on concurrent decode/transform jobs
    pub max_concurrent_transforms: usize,

    /// Capacity of the event broadcast channel
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("data_dir", &self.data_dir)
            .field("file_system", &"FileSystemAccess { ... }")
            .field("image_codec", &"ImageCodec { ... }")
            .field(
                "downloader",
                &self.downloader.as_ref().map(|_| "ArtworkDownloader { ... }"),
            )
            .field("cover_quality", &self.cover_quality)
            .field("cover_size", &self.cover_size)
            .field("memory_cache_mb", &self.memory_cache_mb)
            .field("max_concurrent_transforms", &self.max_concurrent_transforms)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Features can be enabled during configuration to unlock additional capabilities,
/// but may require corresponding bridge implementations to function correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Queue remote lookups when an identity has no canonical artwork
    /// (requires an `ArtworkDownloader`)
    pub enable_artwork_remote: bool,

    /// Run the retention sweep once when the service starts
    pub sweep_on_startup: bool,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Directories are not empty
    /// - Quality is within 1..=100
    /// - Memory budget and worker limits are sane
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.cover_quality == 0 || self.cover_quality > 100 {
            return Err(Error::Config(format!(
                "Cover quality must be between 1 and 100, got {}",
                self.cover_quality
            )));
        }

        if self.memory_cache_mb == 0 {
            return Err(Error::Config(
                "Memory cache must be greater than 0 MB".to_string(),
            ));
        }

        if self.memory_cache_mb > 4096 {
            return Err(Error::Config(
                "Memory cache exceeds maximum of 4GB (4,096 MB)".to_string(),
            ));
        }

        if self.max_concurrent_transforms == 0 {
            return Err(Error::Config(
                "At least one concurrent transform must be allowed".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_artwork_remote && self.downloader.is_none() {
            return Err(Error::Config(
                "Remote artwork enabled but no ArtworkDownloader provided. \
                 Disable the feature or inject an ArtworkDownloader implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for artwork storage. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem. \
                 Mobile: inject a sandboxed file system adapter."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn image_codec_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "ImageCodec".to_string(),
        message: "ImageCodec implementation is required to decode and transform artwork. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default ImageRsCodec. \
                 Mobile: inject a platform-native codec."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(
    cache_dir: &std::path::Path,
    data_dir: &std::path::Path,
) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::with_directories(
        cache_dir.to_path_buf(),
        data_dir.to_path_buf(),
    ));
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(
    _cache_dir: &std::path::Path,
    _data_dir: &std::path::Path,
) -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_image_codec() -> Result<Arc<dyn ImageCodec>> {
    use bridge_desktop::ImageRsCodec;

    let codec: Arc<dyn ImageCodec> = Arc::new(ImageRsCodec::new());
    Ok(codec)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_image_codec() -> Result<Arc<dyn ImageCodec>> {
    Err(image_codec_missing_error())
}

fn default_transform_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    image_codec: Option<Arc<dyn ImageCodec>>,
    downloader: Option<Arc<dyn ArtworkDownloader>>,
    clock: Option<Arc<dyn Clock>>,
    cover_quality: Option<u8>,
    cover_size: Option<u32>,
    memory_cache_mb: Option<usize>,
    max_concurrent_transforms: Option<usize>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the cache directory (derived renditions).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .cache_dir("/path/to/cache");
    /// ```
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Sets the data directory (canonical artwork).
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the image codec implementation.
    ///
    /// If not provided, the desktop default (`image` crate) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn image_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.image_codec = Some(codec);
        self
    }

    /// Sets the remote artwork downloader (optional).
    pub fn downloader(mut self, downloader: Arc<dyn ArtworkDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the JPEG quality for stored artwork.
    ///
    /// Default: 90. A value of 100 stores lossless PNG instead.
    pub fn cover_quality(mut self, quality: u8) -> Self {
        self.cover_quality = Some(quality);
        self
    }

    /// Sets the base artwork edge in logical pixels.
    ///
    /// Default: 200. Values outside 50..=400 fall back to the default when
    /// size tiers are derived.
    pub fn cover_size(mut self, size: u32) -> Self {
        self.cover_size = Some(size);
        self
    }

    /// Sets the decoded-artwork memory budget in megabytes.
    ///
    /// Default: 64 MB
    pub fn memory_cache_mb(mut self, size_mb: usize) -> Self {
        self.memory_cache_mb = Some(size_mb);
        self
    }

    /// Sets the maximum number of concurrent decode/transform jobs.
    ///
    /// Default: available parallelism
    pub fn max_concurrent_transforms(mut self, limit: usize) -> Self {
        self.max_concurrent_transforms = Some(limit);
        self
    }

    /// Sets the event channel capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables remote artwork fetching.
    ///
    /// Requires an `ArtworkDownloader` to be provided.
    ///
    /// Default: false
    pub fn enable_artwork_remote(mut self, enabled: bool) -> Self {
        self.features.enable_artwork_remote = enabled;
        self
    }

    /// Enables or disables the retention sweep at startup.
    ///
    /// Default: false
    pub fn sweep_on_startup(mut self, enabled: bool) -> Self {
        self.features.sweep_on_startup = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - A required directory is missing
    /// - A required bridge is missing and no desktop default is available
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let data_dir = self.data_dir.ok_or_else(|| {
            Error::Config("Data directory is required. Use .data_dir() to set it.".to_string())
        })?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&cache_dir, &data_dir)?,
        };

        let image_codec = match self.image_codec {
            Some(codec) => codec,
            None => provide_default_image_codec()?,
        };

        let config = CoreConfig {
            cache_dir,
            data_dir,
            file_system,
            image_codec,
            downloader: self.downloader,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cover_quality: self.cover_quality.unwrap_or(DEFAULT_COVER_QUALITY),
            cover_size: self.cover_size.unwrap_or(DEFAULT_COVER_SIZE),
            memory_cache_mb: self.memory_cache_mb.unwrap_or(DEFAULT_MEMORY_CACHE_MB),
            max_concurrent_transforms: self
                .max_concurrent_transforms
                .unwrap_or_else(default_transform_limit),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
