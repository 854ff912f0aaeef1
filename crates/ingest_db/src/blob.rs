//! Filesystem-backed blob store implementing the opaque `get`/`put` blob
//! interface consumed by the core.

use crate::error::{DbError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn load(&self, key: &str) -> Result<Vec<u8>>;
    /// A local filesystem path for large-file re-parse, avoiding a
    /// second full read into memory where the backing store already lives
    /// on disk.
    fn get_path(&self, key: &str) -> PathBuf;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> bool;
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key);
        fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DbError::not_found(format!("blob key '{key}' not found")),
                _ => DbError::Io(e),
            })
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.resolve(key)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        fs::metadata(self.resolve(key)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.save("raw/x.csv", b"a,b\n1,2\n").await.unwrap();
        let bytes = store.load("raw/x.csv").await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");
        assert!(store.exists("raw/x.csv").await);
        store.delete("raw/x.csv").await.unwrap();
        assert!(!store.exists("raw/x.csv").await);
    }

    #[tokio::test]
    async fn load_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let err = store.load("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }
}
