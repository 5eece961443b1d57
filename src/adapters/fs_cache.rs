//! Filesystem export cache on `tokio::fs`

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

use crate::core::traits::FileSystemCache;

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileCache;

impl TokioFileCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystemCache for TokioFileCache {
    async fn ensure_directory(&self, path: &Path) -> std::io::Result<()> {
        fs::create_dir_all(path).await
    }

    /// Write through a sibling temp file so readers never see a partial export
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let directory = temp_dir.path().join("a").join("b");
        let path = directory.join("export_ddi.xml");
        let cache = TokioFileCache::new();

        cache.ensure_directory(&directory).await.unwrap();
        cache.write_bytes(&path, b"<codeBook/>").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"<codeBook/>");
        assert!(!directory.join("export_ddi.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("export_ddi.xml");

        assert!(TokioFileCache::new().write_bytes(&path, b"x").await.is_err());
    }
}
