//! Canonical Artwork Store
//!
//! One full-resolution file per identity under `<data>/<kind>/<digest>.<ext>`.
//! A zero-byte file records that the artwork is known to be absent, so a
//! miss does not trigger another expensive lookup.
//!
//! Writes go through [`FileSystemAccess::write_file_atomic`], so readers see
//! either the previous file or the complete new one.

use bridge_traits::image::{EncodeFormat, ImageCodec};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus};
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::derived::DerivedCache;
use crate::error::{ArtworkError, Result};
use crate::identity::{ArtworkCategory, ArtworkIdentity};
use crate::key::CacheKeyEncoder;
use crate::transform;
use crate::workers::TransformPool;

/// What the store knows about an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalState {
    /// A non-empty canonical file exists.
    Present(PathBuf),
    /// Explicitly cleared or searched for without success.
    KnownAbsent,
    /// Never stored.
    Unknown,
}

pub struct ArtworkStore {
    root: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
    codec: Arc<dyn ImageCodec>,
    pool: TransformPool,
    derived: Arc<DerivedCache>,
    format: EncodeFormat,
    event_bus: Option<EventBus>,
}

impl ArtworkStore {
    pub fn new(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystemAccess>,
        codec: Arc<dyn ImageCodec>,
        pool: TransformPool,
        derived: Arc<DerivedCache>,
        format: EncodeFormat,
    ) -> Self {
        Self {
            root: root.into(),
            fs,
            codec,
            pool,
            derived,
            format,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Store directories that exist for this layout, one per kind.
    pub fn canonical_dirs(&self) -> Vec<(ArtworkCategory, PathBuf)> {
        ArtworkCategory::ALL
            .into_iter()
            .filter_map(|category| category.store_dir().map(|dir| (category, self.root.join(dir))))
            .collect()
    }

    /// Replace the canonical artwork of `identity`.
    ///
    /// `None` or an empty payload writes the known-absent marker. Otherwise
    /// the payload is decoded, fitted to `target` when given, and re-encoded
    /// in the store format. A payload that does not decode is rejected and
    /// nothing is written.
    #[instrument(skip(self, identity, data), fields(identity = %identity))]
    pub async fn put(
        &self,
        identity: &ArtworkIdentity,
        data: Option<Bytes>,
        target: Option<(u32, u32)>,
    ) -> Result<()> {
        let path = self.path_with(identity, self.format.extension())?;

        let encoded = match data.filter(|bytes| !bytes.is_empty()) {
            None => Bytes::new(),
            Some(bytes) => self.reencode(identity, bytes, target).await?,
        };

        let prefixes = identity.category.derived_prefixes();
        self.derived.purge_identity(&identity.name, prefixes).await?;

        self.fs.write_file_atomic(&path, encoded.clone()).await?;
        self.remove_sibling(&path).await;

        // Renditions rebuilt from the previous file while it was being replaced.
        self.derived.purge_identity(&identity.name, prefixes).await?;

        if encoded.is_empty() {
            info!(file = %strip_path(&path), "Marked artwork as absent");
        } else {
            info!(file = %strip_path(&path), size = encoded.len(), "Stored canonical artwork");
        }

        self.emit(ArtworkEvent::Changed {
            name: identity.name.clone(),
            category: identity.prefix().to_string(),
        });
        Ok(())
    }

    /// Canonical file of `identity` if one exists and is not a marker.
    pub async fn get_path(&self, identity: &ArtworkIdentity) -> Result<Option<PathBuf>> {
        match self.state(identity).await? {
            CanonicalState::Present(path) => Ok(Some(path)),
            _ => Ok(None),
        }
    }

    pub async fn state(&self, identity: &ArtworkIdentity) -> Result<CanonicalState> {
        for path in self.candidate_paths(identity)? {
            match self.fs.metadata(&path).await {
                Ok(metadata) if metadata.size > 0 => return Ok(CanonicalState::Present(path)),
                Ok(_) => return Ok(CanonicalState::KnownAbsent),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(CanonicalState::Unknown)
    }

    /// Source file to build renditions of `identity` from. Albums that were
    /// never stored fall back to the downloaded copy; an album marked absent
    /// stays absent.
    pub async fn resolve(&self, identity: &ArtworkIdentity) -> Result<Option<PathBuf>> {
        match self.state(identity).await? {
            CanonicalState::Present(path) => Ok(Some(path)),
            CanonicalState::KnownAbsent => Ok(None),
            CanonicalState::Unknown if identity.category == ArtworkCategory::Album => {
                self.get_path(&identity.with_category(ArtworkCategory::Web)).await
            }
            CanonicalState::Unknown => Ok(None),
        }
    }

    /// Bytes of the resolved source, if any.
    pub async fn read(&self, identity: &ArtworkIdentity) -> Result<Option<Bytes>> {
        let Some(path) = self.resolve(identity).await? else {
            return Ok(None);
        };
        match self.fs.read_file(&path).await {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(data)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the canonical file and every rendition of `identity`. Albums
    /// also lose their downloaded copy. Composites have no canonical file,
    /// so only their renditions go. Removing something that is not there is
    /// not an error.
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn remove(&self, identity: &ArtworkIdentity) -> Result<()> {
        let mut removed = false;
        for category in Self::linked_categories(identity.category) {
            let target = identity.with_category(category);

            if category.store_dir().is_some() {
                for path in self.candidate_paths(&target)? {
                    match self.fs.delete_file(&path).await {
                        Ok(()) => removed = true,
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }

            self.derived
                .purge_identity(&target.name, category.derived_prefixes())
                .await?;
        }

        debug!(removed, "Removed canonical artwork");
        self.emit(ArtworkEvent::Cleared {
            name: identity.name.clone(),
            category: identity.prefix().to_string(),
        });
        Ok(())
    }

    /// Move the canonical file of `identity` to `new_name`. Albums also move
    /// their downloaded copy. Returns whether anything was moved.
    #[instrument(skip(self, identity), fields(identity = %identity))]
    pub async fn rename(&self, identity: &ArtworkIdentity, new_name: &str) -> Result<bool> {
        let mut moved = false;
        for category in Self::linked_categories(identity.category) {
            let from = identity.with_category(category);
            let to = ArtworkIdentity::new(new_name, category);

            for path in self.candidate_paths(&from)? {
                let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                let target = self.path_with(&to, extension)?;
                match self.fs.rename(&path, &target).await {
                    Ok(()) => {
                        moved = true;
                        self.remove_sibling(&target).await;
                        break;
                    }
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }

            let prefixes = category.derived_prefixes();
            self.derived.purge_identity(&from.name, prefixes).await?;
            self.derived.purge_identity(&to.name, prefixes).await?;
        }

        if moved {
            info!(new_name, "Renamed canonical artwork");
            self.emit(ArtworkEvent::Changed {
                name: new_name.to_string(),
                category: identity.prefix().to_string(),
            });
        }
        Ok(moved)
    }

    /// Stores that hold artwork for `category`: an album's own file and its
    /// downloaded copy travel together.
    fn linked_categories(category: ArtworkCategory) -> Vec<ArtworkCategory> {
        match category {
            ArtworkCategory::Album => vec![ArtworkCategory::Album, ArtworkCategory::Web],
            other => vec![other],
        }
    }

    async fn reencode(
        &self,
        identity: &ArtworkIdentity,
        data: Bytes,
        target: Option<(u32, u32)>,
    ) -> Result<Bytes> {
        if let Some((width, height)) = target {
            if width == 0 || height == 0 {
                return Err(ArtworkError::InvalidDimensions { width, height });
            }
        }

        let codec = self.codec.clone();
        let format = self.format;
        let name = identity.name.clone();

        self.pool
            .run(move || {
                let decoded = codec.decode(&data).map_err(|e| ArtworkError::DecodeFailure {
                    name,
                    message: e.to_string(),
                })?;
                let fitted = match target {
                    Some((width, height)) => transform::fit(codec.as_ref(), &decoded, width, height)?,
                    None => decoded,
                };
                codec
                    .encode(&fitted, format)
                    .map_err(|e| ArtworkError::EncodeFailure(e.to_string()))
            })
            .await
    }

    fn path_with(&self, identity: &ArtworkIdentity, extension: &str) -> Result<PathBuf> {
        let dir = identity
            .category
            .store_dir()
            .ok_or_else(|| ArtworkError::NoCanonicalStore(identity.prefix().to_string()))?;
        Ok(self
            .root
            .join(dir)
            .join(CacheKeyEncoder::canonical_file_name(&identity.name, extension)))
    }

    /// Preferred extension first.
    fn candidate_paths(&self, identity: &ArtworkIdentity) -> Result<[PathBuf; 2]> {
        let preferred = self.format.extension();
        let other = match self.format {
            EncodeFormat::Png => "jpg",
            EncodeFormat::Jpeg { .. } => "png",
        };
        Ok([self.path_with(identity, preferred)?, self.path_with(identity, other)?])
    }

    /// A format change leaves the old file under the other extension.
    async fn remove_sibling(&self, path: &Path) {
        let sibling = match path.extension().and_then(|e| e.to_str()) {
            Some("jpg") => path.with_extension("png"),
            Some("png") => path.with_extension("jpg"),
            _ => return,
        };
        if let Err(e) = self.fs.delete_file(&sibling).await {
            if !e.is_not_found() {
                warn!(file = %strip_path(&sibling), error = %e, "Failed to remove stale canonical file");
            }
        }
    }

    fn emit(&self, event: ArtworkEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Artwork(event)).ok();
        }
    }
}
