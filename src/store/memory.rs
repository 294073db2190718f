//! In-process object store.
//!
//! Buckets live in a `BTreeMap` so prefix listings come back in key order, the
//! same ordering a real bucket listing gives. Buckets must be created up front;
//! nothing here creates one implicitly.

use super::{BlobRecord, MAX_COMPOSE_SOURCES, ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    md5_hash: String,
}

impl StoredObject {
    fn new(data: Bytes, content_type: Option<String>) -> Self {
        let md5_hash = general_purpose::STANDARD.encode(md5::compute(&data).0);
        Self {
            data,
            content_type,
            md5_hash,
        }
    }

    fn record(&self, bucket: &str, key: &str) -> BlobRecord {
        BlobRecord {
            name: key.to_string(),
            size: self.data.len() as u64,
            content_type: self.content_type.clone(),
            bucket: bucket.to_string(),
            md5_hash: Some(self.md5_hash.clone()),
        }
    }
}

type Bucket = BTreeMap<String, StoredObject>;

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store with the given (empty) buckets already present.
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = names
            .into_iter()
            .map(|name| (name.into(), Bucket::new()))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    /// Keys currently stored in `bucket`, in order. Empty for unknown buckets.
    #[cfg(test)]
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn object_not_found(bucket: &str, key: &str) -> StoreError {
    StoreError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_containers(&self) -> StoreResult<Vec<String>> {
        Ok(self.buckets.read().await.keys().cloned().collect())
    }

    async fn get_container(&self, bucket: &str) -> StoreResult<()> {
        if self.buckets.read().await.contains_key(bucket) {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound(bucket.to_string()))
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BlobRecord>> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let records = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| obj.record(bucket, key))
            .collect::<Vec<_>>();
        debug!(bucket, prefix, count = records.len(), "listed objects");
        Ok(records)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| object_not_found(bucket, key))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StoreResult<BlobRecord> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let stored = StoredObject::new(data, content_type.map(str::to_string));
        let record = stored.record(bucket, key);
        objects.insert(key.to_string(), stored);
        Ok(record)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| object_not_found(bucket, key))
    }

    async fn compose_objects(
        &self,
        bucket: &str,
        dest: &str,
        sources: &[String],
    ) -> StoreResult<BlobRecord> {
        if sources.is_empty() || sources.len() > MAX_COMPOSE_SOURCES {
            return Err(StoreError::Unsupported(format!(
                "compose takes 1 to {} sources, got {}",
                MAX_COMPOSE_SOURCES,
                sources.len()
            )));
        }

        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let mut combined = BytesMut::new();
        let mut content_type = None;
        for source in sources {
            let obj = objects
                .get(source)
                .ok_or_else(|| object_not_found(bucket, source))?;
            if content_type.is_none() {
                content_type = obj.content_type.clone();
            }
            combined.extend_from_slice(&obj.data);
        }

        let stored = StoredObject::new(combined.freeze(), content_type);
        let record = stored.record(bucket, dest);
        objects.insert(dest.to_string(), stored);
        Ok(record)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord> {
        let mut buckets = self.buckets.write().await;
        let source = buckets
            .get(src_bucket)
            .ok_or_else(|| StoreError::BucketNotFound(src_bucket.to_string()))?
            .get(src_key)
            .cloned()
            .ok_or_else(|| object_not_found(src_bucket, src_key))?;
        let dest = buckets
            .get_mut(dest_bucket)
            .ok_or_else(|| StoreError::BucketNotFound(dest_bucket.to_string()))?;
        let record = source.record(dest_bucket, dest_key);
        dest.insert(dest_key.to_string(), source);
        Ok(record)
    }

    async fn rename_object(
        &self,
        bucket: &str,
        src_key: &str,
        dest_key: &str,
    ) -> StoreResult<BlobRecord> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        let obj = objects
            .remove(src_key)
            .ok_or_else(|| object_not_found(bucket, src_key))?;
        let record = obj.record(bucket, dest_key);
        objects.insert(dest_key.to_string(), obj);
        Ok(record)
    }
}
