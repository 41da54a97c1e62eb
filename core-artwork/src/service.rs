//! Artwork Service
//!
//! Single entry point for the presentation layer. Wires the store, the
//! derived cache, the composite renderer, the sweeper and (optionally) the
//! download queue over one set of host capabilities.
//!
//! ## Usage
//!
//! ```ignore
//! use core_artwork::{ArtBehaviour, ArtworkIdentity, ArtworkService};
//!
//! let service = ArtworkService::from_core(&core_config, event_bus)?;
//! let album = ArtworkIdentity::album("John Coltrane - Blue Train");
//!
//! service.set_artwork(&album, Some(cover_bytes)).await?;
//! let cover = service
//!     .get_artwork(&album, 200, 200, 2, ArtBehaviour::CROP_SQUARE | ArtBehaviour::WRITE_THROUGH)
//!     .await?;
//! ```

use bridge_traits::download::ArtworkDownloader;
use bridge_traits::image::{ImageCodec, PixelBuffer};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::{ArtworkCache, ArtworkLookup, ArtworkRequest};
use crate::composite::{CompositeOutcome, CompositeRenderer, CompositeRequest};
use crate::config::{ArtworkConfig, SizeTiers};
use crate::derived::{DerivedCache, MemoryStats};
use crate::error::{ArtworkError, Result};
use crate::identity::ArtworkIdentity;
use crate::key::CacheKeyEncoder;
use crate::store::{ArtworkStore, CanonicalState};
use crate::sweeper::{RetentionPolicy, RetentionSweeper, SweepReport};
use crate::transform::TransformFlags;
use crate::workers::TransformPool;

#[cfg(feature = "artwork-remote")]
use crate::download::{storage_identity, DownloadQueue};

/// Host capabilities the service runs on.
#[derive(Clone)]
pub struct ArtworkDependencies {
    pub file_system: Arc<dyn FileSystemAccess>,
    pub image_codec: Arc<dyn ImageCodec>,
    pub clock: Arc<dyn Clock>,
    pub downloader: Option<Arc<dyn ArtworkDownloader>>,
}

impl ArtworkDependencies {
    pub fn from_core(core: &CoreConfig) -> Self {
        Self {
            file_system: core.file_system.clone(),
            image_codec: core.image_codec.clone(),
            clock: core.clock.clone(),
            downloader: core.downloader.clone(),
        }
    }
}

pub struct ArtworkService {
    config: ArtworkConfig,
    event_bus: EventBus,
    fs: Arc<dyn FileSystemAccess>,
    derived: Arc<DerivedCache>,
    store: Arc<ArtworkStore>,
    cache: Arc<ArtworkCache>,
    composites: Arc<CompositeRenderer>,
    sweeper: RetentionSweeper,
    #[cfg(feature = "artwork-remote")]
    downloads: Option<Arc<DownloadQueue>>,
}

impl ArtworkService {
    pub fn new(config: ArtworkConfig, deps: ArtworkDependencies, event_bus: EventBus) -> Result<Self> {
        config.validate().map_err(ArtworkError::Config)?;

        let pool = TransformPool::new(config.max_concurrent_transforms);
        let derived = Arc::new(DerivedCache::new(
            CacheKeyEncoder::new(config.cache_root.clone(), config.lossless()),
            deps.file_system.clone(),
            deps.image_codec.clone(),
            pool.clone(),
            config.quality,
            config.memory_cache_bytes,
        ));
        let store = Arc::new(
            ArtworkStore::new(
                config.data_root.clone(),
                deps.file_system.clone(),
                deps.image_codec.clone(),
                pool.clone(),
                derived.clone(),
                config.store_format(),
            )
            .with_event_bus(event_bus.clone()),
        );
        let cache = Arc::new(ArtworkCache::new(
            store.clone(),
            derived.clone(),
            deps.image_codec.clone(),
            pool.clone(),
            config.tiers,
        ));
        let composites = Arc::new(
            CompositeRenderer::new(cache.clone(), derived.clone(), pool)
                .with_event_bus(event_bus.clone()),
        );
        let sweeper = RetentionSweeper::new(deps.file_system.clone(), deps.clock.clone())
            .with_event_bus(event_bus.clone());

        #[cfg(feature = "artwork-remote")]
        let downloads = match (&deps.downloader, config.remote_lookups) {
            (Some(downloader), true) => Some(Arc::new(
                DownloadQueue::new(
                    downloader.clone(),
                    store.clone(),
                    config.max_concurrent_downloads,
                )
                .with_event_bus(event_bus.clone()),
            )),
            _ => None,
        };

        info!(
            cache_root = %config.cache_root.display(),
            data_root = %config.data_root.display(),
            quality = config.quality,
            "Artwork service ready"
        );

        Ok(Self {
            config,
            event_bus,
            fs: deps.file_system,
            derived,
            store,
            cache,
            composites,
            sweeper,
            #[cfg(feature = "artwork-remote")]
            downloads,
        })
    }

    pub fn from_core(core: &CoreConfig, event_bus: EventBus) -> Result<Self> {
        Self::new(
            ArtworkConfig::from_core(core),
            ArtworkDependencies::from_core(core),
            event_bus,
        )
    }

    pub fn config(&self) -> &ArtworkConfig {
        &self.config
    }

    pub fn size_tiers(&self) -> SizeTiers {
        self.config.tiers
    }

    /// Rendition of `identity` at `width` x `height` logical pixels.
    ///
    /// `flags` is a bit-set of [`crate::ArtBehaviour`] values. Missing and
    /// corrupt sources both yield `Ok(None)`; a missing source may queue a
    /// remote lookup.
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn get_artwork(
        &self,
        identity: &ArtworkIdentity,
        width: u32,
        height: u32,
        scale_factor: u32,
        flags: u32,
    ) -> Result<Option<Arc<PixelBuffer>>> {
        let request = ArtworkRequest::new(width, height)
            .with_scale_factor(scale_factor)
            .with_flags(TransformFlags::from_bits(flags)?);

        match self.lookup(identity, request).await? {
            ArtworkLookup::NoSource => {
                self.request_download(identity).await;
                Ok(None)
            }
            lookup => Ok(lookup.into_buffer()),
        }
    }

    /// Typed variant of [`Self::get_artwork`] that reports why nothing was
    /// returned.
    pub async fn lookup(&self, identity: &ArtworkIdentity, request: ArtworkRequest) -> Result<ArtworkLookup> {
        self.cache.get(identity, request).await
    }

    /// Replace the canonical artwork. `None` or empty bytes record that the
    /// identity has no artwork.
    pub async fn set_artwork(&self, identity: &ArtworkIdentity, data: Option<Bytes>) -> Result<()> {
        self.store.put(identity, data, None).await
    }

    /// Replace the canonical artwork, fitting it to `width` x `height` first.
    pub async fn set_artwork_scaled(
        &self,
        identity: &ArtworkIdentity,
        data: Bytes,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.store.put(identity, Some(data), Some((width, height))).await
    }

    /// Whether the plain rendition exists at `width` x `height` device pixels.
    pub async fn artwork_exists(&self, identity: &ArtworkIdentity, width: u32, height: u32) -> Result<bool> {
        self.cache.exists(identity, width, height).await
    }

    /// What the canonical store knows about `identity`.
    pub async fn canonical_state(&self, identity: &ArtworkIdentity) -> Result<CanonicalState> {
        self.store.state(identity).await
    }

    /// Delete the canonical file and every rendition; emits `Cleared`.
    pub async fn remove_artwork(&self, identity: &ArtworkIdentity) -> Result<()> {
        self.store.remove(identity).await
    }

    pub async fn rename_artwork(&self, identity: &ArtworkIdentity, new_name: &str) -> Result<bool> {
        self.store.rename(identity, new_name).await
    }

    /// Drop the renditions of `identity` but keep its canonical file.
    pub async fn uncache(&self, identity: &ArtworkIdentity) -> Result<usize> {
        self.cache.uncache(identity).await
    }

    pub async fn render_composite(
        &self,
        request: CompositeRequest,
        token: CancellationToken,
    ) -> Result<CompositeOutcome> {
        self.composites.render(request, token).await
    }

    /// Render a composite on its own task.
    pub fn spawn_composite(
        &self,
        request: CompositeRequest,
        token: CancellationToken,
    ) -> JoinHandle<Result<CompositeOutcome>> {
        self.composites.spawn(request, token)
    }

    /// Apply the retention policy to the derived cache and every store.
    pub async fn sweep_expired(&self) -> SweepReport {
        let policies = RetentionPolicy::defaults(
            &self.config.cache_root,
            &self.config.data_root,
            &self.config.retention,
        );
        let report = self.sweeper.sweep_all(&policies).await;

        // Swept renditions must not keep being served from memory.
        if report.removed > 0 {
            self.derived.clear_memory().await;
        }
        report
    }

    /// Delete every composite rendition.
    pub async fn clear_composites(&self) -> Result<usize> {
        self.derived.purge_category("ROUNDED").await
    }

    /// Delete every derived rendition. Canonical files are kept.
    pub async fn clear_derived(&self) -> Result<usize> {
        self.derived.clear().await
    }

    /// Bytes used on disk by the derived cache and the canonical stores.
    pub async fn disk_usage(&self) -> Result<u64> {
        let mut total = self.derived.disk_usage().await?;
        for (_, dir) in self.store.canonical_dirs() {
            match self.fs.directory_size(&dir).await {
                Ok(size) => total += size,
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    pub async fn memory_stats(&self) -> MemoryStats {
        self.derived.memory_stats().await
    }

    /// Artwork events only.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Artwork(_)))
    }

    /// Number of remote lookups queued or running.
    pub fn pending_downloads(&self) -> usize {
        #[cfg(feature = "artwork-remote")]
        if let Some(queue) = &self.downloads {
            return queue.pending();
        }
        0
    }

    #[cfg(feature = "artwork-remote")]
    async fn request_download(&self, identity: &ArtworkIdentity) {
        let Some(queue) = &self.downloads else {
            return;
        };
        let Ok(target) = storage_identity(identity) else {
            return;
        };

        // Only identities nobody has looked for yet; markers mean a previous
        // lookup already came back empty.
        for candidate in [identity, &target] {
            match self.store.state(candidate).await {
                Ok(CanonicalState::Unknown) => {}
                Ok(_) => return,
                Err(e) => {
                    warn!(identity = %candidate, error = %e, "Could not check canonical state");
                    return;
                }
            }
        }

        if queue.enqueue(identity.clone()) {
            debug!(identity = %identity, "Queued artwork download");
        }
    }

    #[cfg(not(feature = "artwork-remote"))]
    async fn request_download(&self, identity: &ArtworkIdentity) {
        debug!(identity = %identity, "No artwork source");
    }
}
