//! Filesystem-backed blob storage.
//!
//! Keys map directly onto paths under a root directory, preserving the
//! hierarchical key convention on disk. Presigned URLs are redeemed by the
//! API's download route against the configured public base URL.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use simsvc_domain::{ServiceError, ServiceResult};
use tracing::debug;

use crate::presign::DownloadTokenSigner;
use crate::BlobStorage;

pub struct LocalBlobStorage {
    root: PathBuf,
    signer: DownloadTokenSigner,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>, signer: DownloadTokenSigner) -> Self {
        Self {
            root: root.into(),
            signer,
        }
    }

    /// Maps a key to a path under the root, rejecting traversal attempts.
    fn path_for(&self, key: &str) -> ServiceResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|c| c == ".." || c.is_empty())
        {
            return Err(ServiceError::storage(format!("Invalid blob key: {key}")));
        }
        Ok(self.root.join(Path::new(key)))
    }

    async fn write(&self, key: &str, content: &[u8]) -> ServiceResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::storage(format!("Failed to create {key} dirs: {e}")))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ServiceError::storage(format!("Failed to write {key}: {e}")))?;
        debug!(key, bytes = content.len(), "Wrote blob");
        Ok(key.to_string())
    }

    async fn read(&self, key: &str) -> ServiceResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::blob_not_found(key))
            }
            Err(e) => Err(ServiceError::storage(format!("Failed to read {key}: {e}"))),
        }
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn put_json(&self, key: &str, document: &serde_json::Value) -> ServiceResult<String> {
        let bytes = serde_json::to_vec(document)?;
        self.write(key, &bytes).await
    }

    async fn get_json(&self, key: &str) -> ServiceResult<serde_json::Value> {
        let bytes = self.read(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put_bytes(
        &self,
        key: &str,
        content: &[u8],
        _content_type: &str,
    ) -> ServiceResult<String> {
        self.write(key, content).await
    }

    async fn get_bytes(&self, key: &str) -> ServiceResult<Vec<u8>> {
        self.read(key).await
    }

    async fn presign_download(&self, key: &str, ttl_seconds: u64) -> ServiceResult<String> {
        Ok(self.signer.presign(key, ttl_seconds)?.url)
    }

    async fn size(&self, key: &str) -> ServiceResult<Option<i64>> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len() as i64)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::storage(format!("Failed to stat {key}: {e}"))),
        }
    }

    async fn exists(&self, key: &str) -> ServiceResult<bool> {
        Ok(self.size(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> ServiceResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServiceError::storage(format!("Failed to delete {key}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> LocalBlobStorage {
        LocalBlobStorage::new(
            dir.path(),
            DownloadTokenSigner::new("test-secret", "http://localhost:9000"),
        )
    }

    #[tokio::test]
    async fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let doc = serde_json::json!({"iterations": 1000, "nested": {"a": [1, 2, 3]}});

        let key = store
            .put_json("simulations/u/j/parameters.json", &doc)
            .await
            .unwrap();
        assert_eq!(store.get_json(&key).await.unwrap(), doc);
    }

    #[tokio::test]
    async fn missing_key_behaviors() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);

        assert!(matches!(
            store.get_json("simulations/u/j/absent.json").await,
            Err(ServiceError::BlobNotFound { .. })
        ));
        assert_eq!(store.size("simulations/u/j/absent.json").await.unwrap(), None);
        assert!(!store.exists("simulations/u/j/absent.json").await.unwrap());
        assert!(!store.delete("simulations/u/j/absent.json").await.unwrap());
    }

    #[tokio::test]
    async fn bytes_roundtrip_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let content = b"%PDF-1.4 fake".to_vec();

        store
            .put_bytes("reports/u/r/report.pdf", &content, "application/pdf")
            .await
            .unwrap();
        assert_eq!(store.get_bytes("reports/u/r/report.pdf").await.unwrap(), content);
        assert_eq!(
            store.size("reports/u/r/report.pdf").await.unwrap(),
            Some(content.len() as i64)
        );
        assert!(store.delete("reports/u/r/report.pdf").await.unwrap());
        assert!(!store.exists("reports/u/r/report.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        assert!(store.get_bytes("../etc/passwd").await.is_err());
        assert!(store.get_bytes("/abs/path").await.is_err());
        assert!(store.get_bytes("a//b").await.is_err());
    }
}
