//! Blob store adapter: a uniform interface over durable object storage,
//! plus the deterministic key convention external tooling depends on.

pub mod keys;
pub mod local;
pub mod memory;
pub mod presign;

use async_trait::async_trait;
use simsvc_domain::ServiceResult;

pub use local::LocalBlobStorage;
pub use memory::InMemoryBlobStorage;
pub use presign::{DownloadTokenSigner, PresignedUrl};

/// Capability set for durable object storage addressed by hierarchical
/// string keys. Implementations may route presigned-URL generation through
/// a different (publicly reachable) endpoint than internal reads/writes.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores a JSON document; returns the key on success.
    async fn put_json(&self, key: &str, document: &serde_json::Value) -> ServiceResult<String>;
    /// Fails with `BlobNotFound` for an absent key, `StorageUnavailable`
    /// for transport failures.
    async fn get_json(&self, key: &str) -> ServiceResult<serde_json::Value>;
    async fn put_bytes(
        &self,
        key: &str,
        content: &[u8],
        content_type: &str,
    ) -> ServiceResult<String>;
    async fn get_bytes(&self, key: &str) -> ServiceResult<Vec<u8>>;
    /// Produces a time-limited, publicly reachable download URL.
    async fn presign_download(&self, key: &str, ttl_seconds: u64) -> ServiceResult<String>;
    /// None when the key is absent; never errors for a missing key.
    async fn size(&self, key: &str) -> ServiceResult<Option<i64>>;
    async fn exists(&self, key: &str) -> ServiceResult<bool>;
    /// Idempotent; false (not an error) when the key was already absent.
    async fn delete(&self, key: &str) -> ServiceResult<bool>;
}
