//! Derived Rendition Cache
//!
//! Renditions live in one flat directory keyed by [`CacheKey`]. Decoded
//! buffers are also kept in an in-memory LRU bounded by a byte budget, so a
//! hot rendition is decoded at most once.
//!
//! Entries are immutable once written. Invalidation deletes files; nothing is
//! ever rewritten in place.

use bridge_traits::image::{ImageCodec, PixelBuffer};
use bridge_traits::storage::FileSystemAccess;
use core_runtime::logging::strip_path;
use lru::LruCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{ArtworkError, Result};
use crate::key::{digest, CacheKey, CacheKeyEncoder};
use crate::workers::TransformPool;

/// Snapshot of the in-memory layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub entries: usize,
    pub bytes: usize,
    pub budget: usize,
}

struct MemoryCache {
    entries: LruCache<CacheKey, Arc<PixelBuffer>>,
    bytes: usize,
    budget: usize,
}

impl MemoryCache {
    fn new(budget: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
            budget,
        }
    }

    fn get(&mut self, key: &CacheKey) -> Option<Arc<PixelBuffer>> {
        self.entries.get(key).cloned()
    }

    /// Insert, evicting least recently used entries until the buffer fits.
    /// Buffers larger than the whole budget are not kept.
    fn insert(&mut self, key: CacheKey, buffer: Arc<PixelBuffer>) {
        let size = buffer.byte_len();
        if size > self.budget {
            debug!(size, budget = self.budget, "Rendition too large for memory cache");
            return;
        }

        if let Some(previous) = self.entries.pop(&key) {
            self.bytes -= previous.byte_len();
        }

        while self.bytes + size > self.budget {
            match self.entries.pop_lru() {
                Some((_, evicted)) => {
                    self.bytes -= evicted.byte_len();
                    debug!(size = evicted.byte_len(), "Evicted rendition from memory cache");
                }
                None => break,
            }
        }

        self.entries.put(key, buffer);
        self.bytes += size;
    }

    fn remove_where<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let doomed: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            if let Some(buffer) = self.entries.pop(key) {
                self.bytes -= buffer.byte_len();
            }
        }
        doomed.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.bytes = 0;
    }

    fn stats(&self) -> MemoryStats {
        MemoryStats {
            entries: self.entries.len(),
            bytes: self.bytes,
            budget: self.budget,
        }
    }
}

pub struct DerivedCache {
    encoder: CacheKeyEncoder,
    fs: Arc<dyn FileSystemAccess>,
    codec: Arc<dyn ImageCodec>,
    pool: TransformPool,
    quality: u8,
    memory: Mutex<MemoryCache>,
}

impl DerivedCache {
    pub fn new(
        encoder: CacheKeyEncoder,
        fs: Arc<dyn FileSystemAccess>,
        codec: Arc<dyn ImageCodec>,
        pool: TransformPool,
        quality: u8,
        memory_budget: usize,
    ) -> Self {
        Self {
            encoder,
            fs,
            codec,
            pool,
            quality,
            memory: Mutex::new(MemoryCache::new(memory_budget)),
        }
    }

    pub fn encoder(&self) -> &CacheKeyEncoder {
        &self.encoder
    }

    pub fn root(&self) -> &Path {
        self.encoder.root()
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.encoder.path_for(key)
    }

    /// Look the rendition up in memory, then on disk.
    ///
    /// A file that cannot be read or decoded is a miss; undecodable files are
    /// deleted so the next request rebuilds them.
    #[instrument(skip(self, key), fields(segment = %key.segment, width = key.width, height = key.height))]
    pub async fn read(&self, key: &CacheKey) -> Result<Option<Arc<PixelBuffer>>> {
        if let Some(buffer) = self.memory.lock().await.get(key) {
            debug!("Memory cache hit");
            return Ok(Some(buffer));
        }

        let path = self.path_for(key);
        let data = match self.fs.read_file(&path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => {
                warn!(file = %strip_path(&path), error = %e, "Unreadable derived entry");
                return Ok(None);
            }
        };

        let codec = self.codec.clone();
        let decoded = self.pool.run(move || Ok(codec.decode(&data))).await?;

        match decoded {
            Ok(buffer) => {
                let buffer = Arc::new(buffer);
                self.memory.lock().await.insert(key.clone(), buffer.clone());
                debug!(file = %strip_path(&path), "Disk cache hit");
                Ok(Some(buffer))
            }
            Err(e) => {
                warn!(file = %strip_path(&path), error = %e, "Discarding corrupt derived entry");
                self.delete_quietly(&path).await;
                Ok(None)
            }
        }
    }

    /// Encode and persist a rendition atomically, then keep it in memory.
    #[instrument(skip(self, key, buffer), fields(segment = %key.segment, width = key.width, height = key.height))]
    pub async fn write(&self, key: &CacheKey, buffer: Arc<PixelBuffer>) -> Result<PathBuf> {
        let format = self.encoder.format_for(&key.segment, self.quality);
        let codec = self.codec.clone();
        let to_encode = buffer.clone();
        let data = self
            .pool
            .run(move || {
                codec
                    .encode(&to_encode, format)
                    .map_err(|e| ArtworkError::EncodeFailure(e.to_string()))
            })
            .await?;

        let path = self.path_for(key);
        self.fs.write_file_atomic(&path, data).await?;
        self.memory.lock().await.insert(key.clone(), buffer);

        debug!(file = %strip_path(&path), "Stored derived entry");
        Ok(path)
    }

    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        if self.memory.lock().await.get(key).is_some() {
            return Ok(true);
        }
        Ok(self.fs.exists(&self.path_for(key)).await?)
    }

    /// Remove every rendition of `name` under the given prefixes, in every
    /// transform class and size. Returns the number of files deleted.
    #[instrument(skip(self))]
    pub async fn purge_identity(&self, name: &str, prefixes: &[&str]) -> Result<usize> {
        let digest = digest(name);
        self.memory.lock().await.remove_where(|key| {
            key.digest == digest && prefixes.iter().any(|prefix| key.has_prefix(prefix))
        });

        self.remove_files(|file_name| {
            prefixes
                .iter()
                .any(|prefix| CacheKeyEncoder::matches_identity(file_name, prefix, &digest))
        })
        .await
    }

    /// Remove every rendition whose category belongs to `prefix`.
    #[instrument(skip(self))]
    pub async fn purge_category(&self, prefix: &str) -> Result<usize> {
        self.memory
            .lock()
            .await
            .remove_where(|key| key.has_prefix(prefix));

        self.remove_files(|file_name| {
            CacheKeyEncoder::parse(file_name).is_some_and(|parsed| parsed.has_prefix(prefix))
        })
        .await
    }

    /// Empty the derived directory and the memory layer. Temp files of
    /// writes still in flight are left alone.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize> {
        self.clear_memory().await;
        self.remove_files(|file_name| CacheKeyEncoder::parse(file_name).is_some())
            .await
    }

    pub async fn clear_memory(&self) {
        self.memory.lock().await.clear();
    }

    pub async fn memory_stats(&self) -> MemoryStats {
        self.memory.lock().await.stats()
    }

    /// Bytes used by the derived directory on disk.
    pub async fn disk_usage(&self) -> Result<u64> {
        match self.fs.directory_size(self.root()).await {
            Ok(size) => Ok(size),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_files<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let entries = match self.fs.list_directory(self.root()).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for path in entries {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !predicate(file_name) {
                continue;
            }

            match self.fs.delete_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(file = %strip_path(&path), error = %e, "Failed to delete derived entry"),
            }
        }

        debug!(removed, "Removed derived entries");
        Ok(removed)
    }

    async fn delete_quietly(&self, path: &Path) {
        if let Err(e) = self.fs.delete_file(path).await {
            if !e.is_not_found() {
                warn!(file = %strip_path(path), error = %e, "Failed to delete derived entry");
            }
        }
    }
}
