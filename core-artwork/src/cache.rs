//! Artwork Cache
//!
//! Produces renditions for (identity, size, scale factor, flags). Derived
//! entries are looked up first; on a miss the canonical source is decoded
//! and transformed on the worker pool.
//!
//! Sizes in requests are logical pixels. Keys always use device pixels, so
//! the same artwork at two scale factors occupies two entries and no cached
//! bitmap is ever rescaled at read time.

use bridge_traits::image::{ImageCodec, PixelBuffer};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::SizeTiers;
use crate::derived::DerivedCache;
use crate::error::{ArtworkError, Result};
use crate::identity::{ArtworkCategory, ArtworkIdentity};
use crate::key::CacheKey;
use crate::store::ArtworkStore;
use crate::transform::{self, TransformFlags};
use crate::workers::TransformPool;

/// A rendition request in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtworkRequest {
    pub width: u32,
    pub height: u32,
    pub scale_factor: u32,
    pub flags: TransformFlags,
}

impl ArtworkRequest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale_factor: 1,
            flags: TransformFlags::default(),
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_flags(mut self, flags: TransformFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Size in device pixels.
    pub fn device_size(&self) -> Result<(u32, u32)> {
        let invalid = || ArtworkError::InvalidDimensions {
            width: self.width,
            height: self.height,
        };
        let width = self.width.checked_mul(self.scale_factor).ok_or_else(invalid)?;
        let height = self.height.checked_mul(self.scale_factor).ok_or_else(invalid)?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok((width, height))
    }
}

/// Outcome of a lookup.
#[derive(Debug, Clone)]
pub enum ArtworkLookup {
    /// Served from the derived cache.
    Cached(Arc<PixelBuffer>),
    /// Built from the canonical source.
    Rendered(Arc<PixelBuffer>),
    /// No canonical source exists; the caller may start a download.
    NoSource,
    /// The canonical source could not be decoded.
    CorruptSource,
}

impl ArtworkLookup {
    pub fn buffer(&self) -> Option<&Arc<PixelBuffer>> {
        match self {
            ArtworkLookup::Cached(buffer) | ArtworkLookup::Rendered(buffer) => Some(buffer),
            ArtworkLookup::NoSource | ArtworkLookup::CorruptSource => None,
        }
    }

    pub fn into_buffer(self) -> Option<Arc<PixelBuffer>> {
        match self {
            ArtworkLookup::Cached(buffer) | ArtworkLookup::Rendered(buffer) => Some(buffer),
            ArtworkLookup::NoSource | ArtworkLookup::CorruptSource => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ArtworkLookup::Cached(_))
    }
}

enum Rendering {
    Done(PixelBuffer),
    Corrupt(String),
}

pub struct ArtworkCache {
    store: Arc<ArtworkStore>,
    derived: Arc<DerivedCache>,
    codec: Arc<dyn ImageCodec>,
    pool: TransformPool,
    tiers: SizeTiers,
}

impl ArtworkCache {
    pub fn new(
        store: Arc<ArtworkStore>,
        derived: Arc<DerivedCache>,
        codec: Arc<dyn ImageCodec>,
        pool: TransformPool,
        tiers: SizeTiers,
    ) -> Self {
        Self {
            store,
            derived,
            codec,
            pool,
            tiers,
        }
    }

    pub fn store(&self) -> &Arc<ArtworkStore> {
        &self.store
    }

    pub fn derived(&self) -> &Arc<DerivedCache> {
        &self.derived
    }

    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get(&self, identity: &ArtworkIdentity, request: ArtworkRequest) -> Result<ArtworkLookup> {
        let (width, height) = request.device_size()?;
        let flags = request.flags;

        if !flags.uses_banner_source() {
            return self.lookup(identity, width, height, flags).await;
        }

        // Blurred banners are built from one plain entry at a fixed size
        // instead of one entry per requested width.
        let side = self
            .banner_side(identity)
            .checked_mul(request.scale_factor)
            .ok_or(ArtworkError::InvalidDimensions { width, height })?;
        let base_flags = TransformFlags::default()
            .with_write_through(true)
            .with_skip_cache_read(flags.skip_cache_read);

        let base = match self.lookup(identity, side, side, base_flags).await? {
            ArtworkLookup::Cached(buffer) | ArtworkLookup::Rendered(buffer) => buffer,
            other => return Ok(other),
        };

        let codec = self.codec.clone();
        let strength = flags.blur;
        let blurred = self
            .pool
            .run(move || transform::blur_to(codec.as_ref(), &base, width, height, strength))
            .await?;

        debug!(side, width, height, "Blurred banner rendition");
        Ok(ArtworkLookup::Rendered(Arc::new(blurred)))
    }

    /// Whether the plain rendition exists at `width` x `height` device pixels.
    pub async fn exists(&self, identity: &ArtworkIdentity, width: u32, height: u32) -> Result<bool> {
        let key = CacheKey::new(&identity.name, identity.prefix(), width, height);
        self.derived.exists(&key).await
    }

    /// Drop every rendition of `identity`, keeping the canonical file.
    pub async fn uncache(&self, identity: &ArtworkIdentity) -> Result<usize> {
        self.derived
            .purge_identity(&identity.name, identity.category.derived_prefixes())
            .await
    }

    async fn lookup(
        &self,
        identity: &ArtworkIdentity,
        width: u32,
        height: u32,
        flags: TransformFlags,
    ) -> Result<ArtworkLookup> {
        let key = CacheKey::new(
            &identity.name,
            flags.category_segment(identity.prefix()),
            width,
            height,
        );

        if !flags.skip_cache_read {
            if let Some(buffer) = self.derived.read(&key).await? {
                return Ok(ArtworkLookup::Cached(buffer));
            }
        }

        // Composites have no canonical file to rebuild from.
        if identity.category == ArtworkCategory::Rounded {
            return Ok(ArtworkLookup::NoSource);
        }

        let Some(data) = self.store.read(identity).await? else {
            debug!("No canonical source");
            return Ok(ArtworkLookup::NoSource);
        };

        let codec = self.codec.clone();
        let rendering = self
            .pool
            .run(move || {
                let decoded = match codec.decode(&data) {
                    Ok(decoded) => decoded,
                    Err(e) => return Ok(Rendering::Corrupt(e.to_string())),
                };
                transform::apply(codec.as_ref(), &decoded, width, height, &flags).map(Rendering::Done)
            })
            .await?;

        let buffer = match rendering {
            Rendering::Done(buffer) => Arc::new(buffer),
            Rendering::Corrupt(message) => {
                warn!(error = %message, "Canonical artwork is corrupt");
                return Ok(ArtworkLookup::CorruptSource);
            }
        };

        if flags.write_through {
            if let Err(e) = self.derived.write(&key, buffer.clone()).await {
                warn!(error = %e, "Failed to persist rendition");
            }
        }

        Ok(ArtworkLookup::Rendered(buffer))
    }

    fn banner_side(&self, identity: &ArtworkIdentity) -> u32 {
        match identity.category {
            ArtworkCategory::Artist => self.tiers.banner,
            _ => self.tiers.big,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_size_multiplies_scale() {
        let request = ArtworkRequest::new(100, 50).with_scale_factor(2);
        assert_eq!(request.device_size().unwrap(), (200, 100));
    }

    #[test]
    fn test_device_size_rejects_zero_and_overflow() {
        assert!(matches!(
            ArtworkRequest::new(0, 50).device_size(),
            Err(ArtworkError::InvalidDimensions { .. })
        ));
        assert!(ArtworkRequest::new(10, 10)
            .with_scale_factor(0)
            .device_size()
            .is_err());
        assert!(ArtworkRequest::new(u32::MAX, 10)
            .with_scale_factor(2)
            .device_size()
            .is_err());
    }

    #[test]
    fn test_lookup_buffer_accessors() {
        let buffer = Arc::new(PixelBuffer::filled(1, 1, [0, 0, 0, 255]));
        let cached = ArtworkLookup::Cached(buffer.clone());
        assert!(cached.is_cached());
        assert!(cached.buffer().is_some());
        assert!(ArtworkLookup::Rendered(buffer).into_buffer().is_some());
        assert!(ArtworkLookup::NoSource.into_buffer().is_none());
        assert!(ArtworkLookup::CorruptSource.buffer().is_none());
    }
}
