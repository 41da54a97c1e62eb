//! Storage and File System Abstractions
//!
//! Provides the platform-agnostic file I/O trait used by the artwork store,
//! the derived cache and the retention sweeper.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    /// Last modification time as Unix seconds
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn cache_data(fs: &dyn FileSystemAccess, data: &[u8]) -> Result<()> {
///     let cache_dir = fs.get_cache_directory().await?;
///     let file_path = cache_dir.join("data.bin");
///     fs.write_file_atomic(&file_path, data.to_vec().into()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// This directory is suitable for regenerable files that can be deleted
    /// by the system when storage is low.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Get the application's data directory
    ///
    /// This directory is suitable for persistent application data.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating it if it doesn't exist
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Rename a file, replacing the destination if it exists
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Write data so that readers observe either the old file or the complete
    /// new one, never a partial write.
    ///
    /// The default writes a hidden sibling and renames it over `path`.
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| BridgeError::InvalidInput(format!("{} has no parent", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BridgeError::InvalidInput(format!("{} has no file name", path.display())))?;

        let temp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));
        self.write_file(&temp, data).await?;

        if let Err(e) = self.rename(&temp, path).await {
            let _ = self.delete_file(&temp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Calculate total size of a directory recursively
    async fn directory_size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;
        let entries = self.list_directory(path).await?;

        for entry in entries {
            let metadata = self.metadata(&entry).await?;
            if metadata.is_directory {
                total += self.directory_size(&entry).await?;
            } else {
                total += metadata.size;
            }
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn get_cache_directory(&self) -> Result<PathBuf>;
            async fn get_data_directory(&self) -> Result<PathBuf>;
            async fn exists(&self, path: &Path) -> Result<bool>;
            async fn metadata(&self, path: &Path) -> Result<FileMetadata>;
            async fn create_dir_all(&self, path: &Path) -> Result<()>;
            async fn read_file(&self, path: &Path) -> Result<Bytes>;
            async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;
            async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
            async fn delete_file(&self, path: &Path) -> Result<()>;
            async fn delete_dir_all(&self, path: &Path) -> Result<()>;
            async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
        }
    }

    #[test]
    fn test_file_metadata() {
        let metadata = FileMetadata {
            size: 1024,
            created_at: Some(1234567890),
            modified_at: Some(1234567900),
            is_directory: false,
        };

        assert_eq!(metadata.size, 1024);
        assert!(!metadata.is_directory);
    }

    #[tokio::test]
    async fn test_atomic_write_renames_temp_file() {
        let mut fs = MockFs::new();
        fs.expect_write_file()
            .withf(|path, _| {
                let name = path.file_name().unwrap().to_str().unwrap();
                name.starts_with(".cover.jpg.") && name.ends_with(".tmp")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        fs.expect_rename()
            .withf(|_, to| to == Path::new("/cache/cover.jpg"))
            .times(1)
            .returning(|_, _| Ok(()));

        fs.write_file_atomic(Path::new("/cache/cover.jpg"), Bytes::from_static(b"data"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_atomic_write_cleans_up_on_rename_failure() {
        let mut fs = MockFs::new();
        fs.expect_write_file().returning(|_, _| Ok(()));
        fs.expect_rename()
            .returning(|_, _| Err(BridgeError::OperationFailed("cross-device".to_string())));
        fs.expect_delete_file().times(1).returning(|_| Ok(()));

        let result = fs
            .write_file_atomic(Path::new("/cache/cover.jpg"), Bytes::from_static(b"data"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_directory_size_recurses() {
        let mut fs = MockFs::new();
        fs.expect_list_directory()
            .withf(|path| path == Path::new("/root"))
            .returning(|_| Ok(vec![PathBuf::from("/root/a"), PathBuf::from("/root/sub")]));
        fs.expect_list_directory()
            .withf(|path| path == Path::new("/root/sub"))
            .returning(|_| Ok(vec![PathBuf::from("/root/sub/b")]));
        fs.expect_metadata().returning(|path| {
            Ok(FileMetadata {
                size: if path.ends_with("sub") { 0 } else { 10 },
                created_at: None,
                modified_at: None,
                is_directory: path.ends_with("sub"),
            })
        });

        assert_eq!(fs.directory_size(Path::new("/root")).await.unwrap(), 20);
    }
}
