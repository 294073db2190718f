//! Backend object-store capability.
//!
//! The browser core never talks to a storage service directly. It goes through
//! [`ObjectStore`], a flat bucket/object interface with list-by-prefix, whole
//! object reads and writes, and server-side compose/copy/rename.
//!
//! Two implementations ship with the service:
//! - [`gcs::GcsStore`] — Google Cloud Storage JSON API over HTTP.
//! - [`memory::MemoryStore`] — in-process buckets, used for local runs and tests.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod gcs;
pub mod memory;

pub use gcs::GcsStore;
pub use memory::MemoryStore;

/// Maximum number of source objects a single compose call accepts.
pub const MAX_COMPOSE_SOURCES: usize = 32;

/// Snapshot of one object as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobRecord {
    /// Full key within the bucket.
    pub name: String,

    /// Size in bytes.
    pub size: u64,

    /// Content type (MIME type) stored with the object.
    pub content_type: Option<String>,

    /// Name of the bucket holding the object.
    pub bucket: String,

    /// Base64-encoded MD5 digest of the payload, when the backend reports one.
    pub md5_hash: Option<String>,
}

impl BlobRecord {
    /// Placeholder objects (names ending in `/`) stand in for empty directories.
    pub fn is_placeholder(&self) -> bool {
        self.name.ends_with('/')
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("backend request timed out")]
    Timeout,
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unsupported backend operation: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Flat bucket/object storage as seen by the browser core.
///
/// Implementations must be safe to share across concurrent requests; the
/// service holds one instance behind an `Arc` for its whole lifetime.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Names of every bucket visible to this client.
    async fn list_containers(&self) -> StoreResult<Vec<String>>;

    /// Confirm a bucket exists. Fails with `BucketNotFound` otherwise.
    async fn get_container(&self, bucket: &str) -> StoreResult<()>;

    /// Every object whose name starts with `prefix`, in key order.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BlobRecord>>;

    /// Download the full payload of one object.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Write an object, replacing any existing one with the same key.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<BlobRecord>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Concatenate `sources` (in order) into `dest` within one bucket.
    async fn compose_objects(
        &self,
        bucket: &str,
        dest: &str,
        sources: &[String],
    ) -> StoreResult<BlobRecord>;

    /// Server-side copy; no payload bytes pass through the caller.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord>;

    /// Rename an object within a bucket.
    async fn rename_object(
        &self,
        bucket: &str,
        src_key: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord>;
}
