//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const APP_DIR: &str = "artwork-cache";

/// Async file I/O over `tokio::fs`, rooted in the platform cache and data
/// directories unless custom ones are supplied.
///
/// Writes create missing parent directories, so callers never have to
/// prepare the store layout up front.
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl TokioFileSystem {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        let data_dir = dirs::data_local_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self { cache_dir, data_dir }
    }

    pub fn with_directories(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { cache_dir, data_dir }
    }

    async fn ensure_dir(dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        Ok(dir.to_path_buf())
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_secs(time: std::io::Result<SystemTime>) -> Option<i64> {
    let elapsed = time.ok()?.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(elapsed.as_secs()).ok()
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Self::ensure_dir(&self.cache_dir).await
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        Self::ensure_dir(&self.data_dir).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path).await?;
        Ok(FileMetadata {
            size: metadata.len(),
            created_at: unix_secs(metadata.created()),
            modified_at: unix_secs(metadata.modified()),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await?;
        debug!(file = ?path.file_name(), size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;
        fs::write(path, &data).await?;
        debug!(file = ?path.file_name(), size = data.len(), "Wrote file");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        Self::ensure_parent(to).await?;
        fs::rename(from, to).await?;
        debug!(from = ?from.file_name(), to = ?to.file_name(), "Renamed file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await?;
        debug!(file = ?path.file_name(), "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).await?;
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut read_dir = fs::read_dir(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            entries.push(entry.path());
        }
        Ok(entries)
    }

    /// Temp sibling, flushed to disk before it replaces `path`.
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<()> {
        Self::ensure_parent(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::File::create(&temp).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        debug!(file = %file_name, size = data.len(), "Replaced file atomically");
        Ok(())
    }

    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }
        Ok(total)
    }
}
