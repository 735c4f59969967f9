//! In-memory blob storage for tests and embedded deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use simsvc_domain::{ServiceError, ServiceResult};

use crate::presign::DownloadTokenSigner;
use crate::BlobStorage;

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Vec<u8>,
    content_type: String,
}

pub struct InMemoryBlobStorage {
    blobs: RwLock<HashMap<String, StoredBlob>>,
    signer: DownloadTokenSigner,
}

impl InMemoryBlobStorage {
    pub fn new(signer: DownloadTokenSigner) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            signer,
        }
    }

    /// Test helper with a fixed signer.
    pub fn for_tests() -> Self {
        Self::new(DownloadTokenSigner::new(
            "test-secret",
            "http://localhost:9000",
        ))
    }

    /// Content type recorded at upload time, if the key exists.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.blobs
            .read()
            .expect("blob map poisoned")
            .get(key)
            .map(|b| b.content_type.clone())
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn put_json(&self, key: &str, document: &serde_json::Value) -> ServiceResult<String> {
        let bytes = serde_json::to_vec(document)?;
        self.put_bytes(key, &bytes, "application/json").await
    }

    async fn get_json(&self, key: &str) -> ServiceResult<serde_json::Value> {
        let bytes = self.get_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put_bytes(
        &self,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> ServiceResult<String> {
        self.blobs.write().expect("blob map poisoned").insert(
            key.to_string(),
            StoredBlob {
                content: content.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(key.to_string())
    }

    async fn get_bytes(&self, key: &str) -> ServiceResult<Vec<u8>> {
        self.blobs
            .read()
            .expect("blob map poisoned")
            .get(key)
            .map(|b| b.content.clone())
            .ok_or_else(|| ServiceError::blob_not_found(key))
    }

    async fn presign_download(&self, key: &str, ttl_seconds: u64) -> ServiceResult<String> {
        Ok(self.signer.presign(key, ttl_seconds)?.url)
    }

    async fn size(&self, key: &str) -> ServiceResult<Option<i64>> {
        Ok(self
            .blobs
            .read()
            .expect("blob map poisoned")
            .get(key)
            .map(|b| b.content.len() as i64))
    }

    async fn exists(&self, key: &str) -> ServiceResult<bool> {
        Ok(self
            .blobs
            .read()
            .expect("blob map poisoned")
            .contains_key(key))
    }

    async fn delete(&self, key: &str) -> ServiceResult<bool> {
        Ok(self
            .blobs
            .write()
            .expect("blob map poisoned")
            .remove(key)
            .is_some())
    }
}
