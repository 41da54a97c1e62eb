//! Shared fixtures for unit tests.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bytes::Bytes;
use mockall::mock;
use std::path::{Path, PathBuf};

mock! {
    pub Fs {}

    #[async_trait::async_trait]
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

pub fn not_found() -> BridgeError {
    BridgeError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
}
