//! src/services/browser_service.rs
//!
//! BrowserService — file-browser operations over a flat object store. Paths
//! are translated into bucket/key pairs, directories are synthesized from key
//! prefixes, and writes go through whole-object puts (or the chunked upload
//! protocol in `uploads`).
//!
//! Nothing here holds locks across backend calls. Concurrent writers to the
//! same key race at the backend with last-write-wins; copy's unique-name lookup
//! can race with another writer picking the same name.

use super::{
    listing,
    locator::{self, Location},
    paths,
    uploads::{self, ChunkStep, ChunkTracker},
};
use crate::{
    models::{
        contents::{CheckpointModel, Contents, EntryKind, FileModel, ListingEntry},
        requests::{ContentFormat, SaveRequest},
    },
    store::{BlobRecord, ObjectStore, StoreError},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_MIMETYPE: &str = "application/octet-stream";
const UNTITLED_FILE: &str = "untitled";
const UNTITLED_FOLDER: &str = "Untitled Folder";
const CHECKPOINT_ID: &str = "checkpoint";

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("`{path}` is not a valid object name ({matches} objects share the prefix)")]
    AmbiguousMatch { path: String, matches: usize },
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("rejected chunk {chunk} for `{path}`: {reason}")]
    InvalidChunk {
        path: String,
        chunk: i64,
        reason: String,
    },
    #[error(transparent)]
    Backend(StoreError),
}

impl From<StoreError> for BrowserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BucketNotFound(bucket) => {
                BrowserError::NotFound(format!("bucket `{}`", bucket))
            }
            StoreError::ObjectNotFound { bucket, key } => {
                BrowserError::NotFound(format!("object `{}` in bucket `{}`", key, bucket))
            }
            other => BrowserError::Backend(other),
        }
    }
}

pub type BrowserResult<T> = Result<T, BrowserError>;

fn invalid_path(path: &str, reason: &str) -> BrowserError {
    BrowserError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Encode a save request's content into the bytes to store and their content type.
fn encode_content(
    content: &Value,
    format: ContentFormat,
) -> BrowserResult<(Bytes, &'static str)> {
    match format {
        ContentFormat::Base64 => {
            let encoded = content.as_str().ok_or_else(|| {
                BrowserError::InvalidContent("base64 content must be a string".into())
            })?;
            let decoded = general_purpose::STANDARD
                .decode(encoded)
                .map_err(|err| BrowserError::InvalidContent(err.to_string()))?;
            Ok((Bytes::from(decoded), DEFAULT_MIMETYPE))
        }
        ContentFormat::Json => {
            let serialized = serde_json::to_vec(content)
                .map_err(|err| BrowserError::InvalidContent(err.to_string()))?;
            Ok((Bytes::from(serialized), "application/json"))
        }
        ContentFormat::Text => {
            let text = match content {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            Ok((Bytes::from(text), "text/plain"))
        }
    }
}

/// File-browser operations over an injected object store.
///
/// Cheap to clone; the store handle is shared by every request.
#[derive(Clone)]
pub struct BrowserService {
    /// Backend shared by all requests for the lifetime of the service.
    pub store: Arc<dyn ObjectStore>,

    /// Present only when strict chunk ordering is enabled.
    chunk_tracker: Option<Arc<ChunkTracker>>,
}

impl BrowserService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            chunk_tracker: None,
        }
    }

    /// Reject out-of-order and repeated upload chunks, forgetting uploads idle
    /// for longer than `ttl`.
    pub fn with_strict_chunk_order(mut self, ttl: Duration) -> Self {
        self.chunk_tracker = Some(Arc::new(ChunkTracker::new(ttl)));
        self
    }

    /// List a directory or download a file.
    ///
    /// The root lists buckets. A path naming exactly one object returns that
    /// object read fully into memory and base64-encoded; anything else lists
    /// the prefix, which may be empty.
    pub async fn read(&self, path: &str) -> BrowserResult<Contents> {
        match locator::locate(self.store.as_ref(), path).await? {
            Location::Root => {
                let names = self.store.list_containers().await?;
                Ok(Contents::Directory(listing::buckets(&names)))
            }
            Location::Single(record) => {
                let data = self.store.get_object(&record.bucket, &record.name).await?;
                debug!(
                    bucket = %record.bucket,
                    key = %record.name,
                    size = data.len(),
                    "read object"
                );
                Ok(Contents::File(FileModel {
                    path: format!("{}/{}", record.bucket, record.name),
                    kind: EntryKind::File,
                    mimetype: record
                        .content_type
                        .unwrap_or_else(|| DEFAULT_MIMETYPE.to_string()),
                    content: general_purpose::STANDARD.encode(&data),
                }))
            }
            Location::Prefix { parsed, blobs } => Ok(Contents::Directory(listing::synthesize(
                &parsed.bucket,
                &parsed.key,
                &blobs,
            ))),
        }
    }

    /// Write a whole object, replacing whatever is there.
    pub async fn write(
        &self,
        path: &str,
        content: &Value,
        format: ContentFormat,
    ) -> BrowserResult<BlobRecord> {
        let dest = object_destination(path)?;
        let (data, content_type) = encode_content(content, format)?;
        let record = self
            .store
            .put_object(&dest.bucket, &dest.key, data, Some(content_type))
            .await?;
        info!(path = %dest, size = record.size, "wrote object");
        Ok(record)
    }

    /// Handle a save request, either single-shot or one chunk of a chunked upload.
    pub async fn save(&self, request: &SaveRequest) -> BrowserResult<()> {
        let Some(chunk) = request.chunk else {
            self.write(&request.path, &request.content, request.format)
                .await?;
            return Ok(());
        };

        let dest = object_destination(&request.path)?;
        let step = ChunkStep::from_index(chunk).ok_or_else(|| BrowserError::InvalidChunk {
            path: request.path.clone(),
            chunk,
            reason: "chunk index must be positive or -1".into(),
        })?;

        let session_key = dest.to_string();
        if let Some(tracker) = &self.chunk_tracker {
            tracker.check(&session_key, step, Utc::now())?;
        }

        let applied = match encode_content(&request.content, request.format) {
            Ok((data, content_type)) => {
                uploads::apply_chunk(
                    self.store.as_ref(),
                    &dest,
                    step,
                    chunk,
                    data,
                    Some(content_type),
                )
                .await
            }
            Err(err) => Err(err),
        };

        if let Some(tracker) = &self.chunk_tracker {
            match &applied {
                Ok(()) => tracker.record(&session_key, step, Utc::now()),
                Err(_) => tracker.release(&session_key),
            }
        }
        applied
    }

    /// Delete the object a path names. Prefixes, missing keys and the root are
    /// left alone and still succeed.
    pub async fn delete(&self, path: &str) -> BrowserResult<()> {
        match locator::locate(self.store.as_ref(), path).await? {
            Location::Single(record) => {
                self.store
                    .delete_object(&record.bucket, &record.name)
                    .await?;
                info!(bucket = %record.bucket, key = %record.name, "deleted object");
            }
            Location::Root => debug!("ignoring delete of the store root"),
            Location::Prefix { parsed, .. } => {
                debug!(path = %parsed, "ignoring delete of a prefix");
            }
        }
        Ok(())
    }

    /// First free name for `proposed` in `bucket`: the name itself, then
    /// `stem-Copy1.ext`, `stem-Copy2.ext`, ...
    ///
    /// Check-then-use is not atomic; a concurrent writer may claim the name
    /// between the check and the caller's write.
    pub async fn unique_name(&self, bucket: &str, proposed: &str) -> BrowserResult<String> {
        let (stem, ext) = paths::split_extension(proposed);
        let mut candidate = proposed.to_string();
        let mut attempt = 0u32;
        while locator::object_exists(self.store.as_ref(), bucket, &candidate).await? {
            attempt += 1;
            candidate = format!("{}-Copy{}{}", stem, attempt, ext);
        }
        Ok(candidate)
    }

    /// Copy one object into a directory under a non-colliding name.
    pub async fn copy(&self, source: &str, dest_dir: &str) -> BrowserResult<ListingEntry> {
        let record = locator::locate_single(self.store.as_ref(), source).await?;
        let name = paths::basename(&record.name);
        if name.is_empty() {
            return Err(invalid_path(source, "source has no file name"));
        }

        let dir = paths::normalize(dest_dir);
        if paths::is_root(&dir) {
            return Err(invalid_path(dest_dir, "cannot copy into the store root"));
        }
        let dest = paths::parse(&dir);
        if dest.bucket != record.bucket {
            self.store.get_container(&dest.bucket).await?;
        }
        let proposed = format!("{}{}", paths::as_dir_prefix(&dest.key), name);
        let dest_key = self.unique_name(&dest.bucket, &proposed).await?;

        let copied = self
            .store
            .copy_object(&record.bucket, &record.name, &dest.bucket, &dest_key)
            .await?;
        info!(
            from = %format!("{}/{}", record.bucket, record.name),
            to = %format!("{}/{}", copied.bucket, copied.name),
            "copied object"
        );
        Ok(file_entry(&copied.bucket, &copied.name))
    }

    /// Rename one object. A destination ending in `/` keeps the source's name
    /// inside that directory. Moves between buckets are rejected.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> BrowserResult<ListingEntry> {
        let record = locator::locate_single(self.store.as_ref(), old_path).await?;

        let target = paths::normalize(new_path);
        if paths::is_root(&target) {
            return Err(invalid_path(new_path, "cannot move to the store root"));
        }
        let mut dest = paths::parse(&target);
        if dest.bucket != record.bucket {
            return Err(invalid_path(new_path, "moving between buckets is not supported"));
        }
        if dest.key.is_empty() || dest.key.ends_with('/') {
            dest.key.push_str(paths::basename(&record.name));
        }
        if dest.key == record.name {
            debug!(path = %dest, "move onto itself; nothing to do");
            return Ok(file_entry(&record.bucket, &record.name));
        }

        let moved = self
            .store
            .rename_object(&record.bucket, &record.name, &dest.key)
            .await?;
        info!(bucket = %moved.bucket, from = %record.name, to = %moved.name, "moved object");
        Ok(file_entry(&moved.bucket, &moved.name))
    }

    /// Create an empty file (`untitled<ext>`, `untitled1<ext>`, ...) or an
    /// empty directory (`Untitled Folder`, `Untitled Folder 1`, ...) in `dir`.
    ///
    /// Directories are stored as a placeholder object whose name ends in `/`.
    pub async fn new_untitled(
        &self,
        dir: &str,
        kind: EntryKind,
        ext: Option<&str>,
    ) -> BrowserResult<ListingEntry> {
        let normalized = paths::normalize(dir);
        if paths::is_root(&normalized) {
            return Err(invalid_path(dir, "cannot create objects at the store root"));
        }
        let parent = paths::parse(&normalized);
        let prefix = paths::as_dir_prefix(&parent.key);
        let store = self.store.as_ref();

        let mut attempt = 0u32;
        loop {
            let suffix = match attempt {
                0 => String::new(),
                n if kind == EntryKind::Directory => format!(" {}", n),
                n => n.to_string(),
            };
            match kind {
                EntryKind::File => {
                    let ext = ext.unwrap_or(".txt");
                    let key = format!("{}{}{}{}", prefix, UNTITLED_FILE, suffix, ext);
                    if !locator::object_exists(store, &parent.bucket, &key).await? {
                        store
                            .put_object(&parent.bucket, &key, Bytes::new(), Some("text/plain"))
                            .await?;
                        info!(bucket = %parent.bucket, key = %key, "created untitled file");
                        return Ok(file_entry(&parent.bucket, &key));
                    }
                }
                EntryKind::Directory => {
                    let key = format!("{}{}{}/", prefix, UNTITLED_FOLDER, suffix);
                    if store.list_objects(&parent.bucket, &key).await?.is_empty() {
                        store
                            .put_object(&parent.bucket, &key, Bytes::new(), None)
                            .await?;
                        info!(bucket = %parent.bucket, key = %key, "created directory placeholder");
                        let name = format!("{}/", paths::basename(&key));
                        return Ok(ListingEntry::directory(
                            format!("{}/{}", parent.bucket, key),
                            name,
                        ));
                    }
                }
            }
            attempt += 1;
        }
    }

    /// The store keeps no history, so there are never checkpoints to list.
    pub async fn list_checkpoints(&self, path: &str) -> BrowserResult<Vec<CheckpointModel>> {
        locator::locate_single(self.store.as_ref(), path).await?;
        Ok(Vec::new())
    }

    /// Acknowledge a checkpoint request for an existing file without storing anything.
    pub async fn create_checkpoint(&self, path: &str) -> BrowserResult<CheckpointModel> {
        locator::locate_single(self.store.as_ref(), path).await?;
        Ok(CheckpointModel {
            id: CHECKPOINT_ID.to_string(),
            last_modified: Utc::now(),
        })
    }

    /// Checkpoints are never stored; restoring one leaves the file as is.
    pub async fn restore_checkpoint(&self, path: &str, _checkpoint_id: &str) -> BrowserResult<()> {
        locator::locate_single(self.store.as_ref(), path).await?;
        Ok(())
    }

    pub async fn delete_checkpoint(&self, path: &str, _checkpoint_id: &str) -> BrowserResult<()> {
        locator::locate_single(self.store.as_ref(), path).await?;
        Ok(())
    }
}

/// Resolve `path` to a bucket and a non-empty key that can be written.
fn object_destination(path: &str) -> BrowserResult<paths::ParsedPath> {
    let normalized = paths::normalize(path);
    if paths::is_root(&normalized) {
        return Err(invalid_path(path, "cannot write to the store root"));
    }
    let parsed = paths::parse(&normalized);
    if parsed.key.is_empty() || parsed.key.ends_with('/') {
        return Err(invalid_path(path, "path does not name an object"));
    }
    Ok(parsed)
}

fn file_entry(bucket: &str, key: &str) -> ListingEntry {
    ListingEntry::file(format!("{}/{}", bucket, key), paths::basename(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use serde_json::json;

    async fn service_with(keys: &[(&str, &str)]) -> (BrowserService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_buckets(["mybucket", "other"]));
        for (key, body) in keys {
            store
                .put_object(
                    "mybucket",
                    key,
                    Bytes::from(body.to_string()),
                    Some("text/plain"),
                )
                .await
                .unwrap();
        }
        (BrowserService::new(store.clone()), store)
    }

    fn save(path: &str, content: &str, chunk: Option<i64>) -> SaveRequest {
        SaveRequest {
            path: path.to_string(),
            content: json!(content),
            format: ContentFormat::Text,
            chunk,
        }
    }

    #[tokio::test]
    async fn read_root_lists_buckets() {
        let (service, _) = service_with(&[]).await;
        assert_eq!(
            service.read("/").await.unwrap(),
            Contents::Directory(vec![
                ListingEntry::directory("mybucket/", "mybucket/"),
                ListingEntry::directory("other/", "other/"),
            ])
        );
    }

    #[tokio::test]
    async fn read_root_of_empty_store() {
        let service = BrowserService::new(Arc::new(MemoryStore::new()));
        assert_eq!(service.read("").await.unwrap(), Contents::Directory(vec![]));
    }

    #[tokio::test]
    async fn read_file_is_base64() {
        let (service, _) = service_with(&[("dir/a.txt", "hello")]).await;
        match service.read("mybucket/dir/a.txt").await.unwrap() {
            Contents::File(file) => {
                assert_eq!(file.path, "mybucket/dir/a.txt");
                assert_eq!(file.mimetype, "text/plain");
                assert_eq!(file.content, "aGVsbG8=");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_directory_synthesizes_children() {
        let (service, _) =
            service_with(&[("dir/sub/file.txt", "x"), ("dir/other.txt", "y")]).await;
        assert_eq!(
            service.read("/mybucket/dir/").await.unwrap(),
            Contents::Directory(vec![
                ListingEntry::file("mybucket/dir/other.txt", "other.txt"),
                ListingEntry::directory("mybucket/dir/sub/", "sub/"),
            ])
        );
    }

    #[tokio::test]
    async fn read_missing_prefix_is_empty_directory() {
        let (service, _) = service_with(&[]).await;
        assert_eq!(
            service.read("mybucket/nothing/here/").await.unwrap(),
            Contents::Directory(vec![])
        );
    }

    #[tokio::test]
    async fn read_missing_bucket_is_an_error() {
        let (service, _) = service_with(&[]).await;
        assert!(matches!(
            service.read("ghost/").await.unwrap_err(),
            BrowserError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn write_formats() {
        let (service, store) = service_with(&[]).await;
        service
            .write("mybucket/a.bin", &json!("AAEC"), ContentFormat::Base64)
            .await
            .unwrap();
        service
            .write("mybucket/n.json", &json!({"k": [1, 2]}), ContentFormat::Json)
            .await
            .unwrap();
        service
            .write("mybucket/t.txt", &json!("plain"), ContentFormat::Text)
            .await
            .unwrap();

        assert_eq!(store.get_object("mybucket", "a.bin").await.unwrap(), &[0u8, 1, 2][..]);
        assert_eq!(
            store.get_object("mybucket", "n.json").await.unwrap(),
            r#"{"k":[1,2]}"#
        );
        assert_eq!(store.get_object("mybucket", "t.txt").await.unwrap(), "plain");
    }

    #[tokio::test]
    async fn write_rejects_bad_base64_and_non_object_paths() {
        let (service, _) = service_with(&[]).await;
        assert!(matches!(
            service
                .write("mybucket/a.bin", &json!("not base64!"), ContentFormat::Base64)
                .await
                .unwrap_err(),
            BrowserError::InvalidContent(_)
        ));
        for path in ["/", "mybucket/", "mybucket/dir/"] {
            assert!(matches!(
                service
                    .write(path, &json!("x"), ContentFormat::Text)
                    .await
                    .unwrap_err(),
                BrowserError::InvalidPath { .. }
            ));
        }
    }

    #[tokio::test]
    async fn write_overwrites() {
        let (service, store) = service_with(&[("a.txt", "old")]).await;
        service.save(&save("mybucket/a.txt", "new", None)).await.unwrap();
        assert_eq!(store.get_object("mybucket", "a.txt").await.unwrap(), "new");
    }

    #[tokio::test]
    async fn chunked_save_produces_one_object() {
        let (service, store) = service_with(&[]).await;
        service.save(&save("mybucket/file.bin", "AA", Some(1))).await.unwrap();
        service.save(&save("mybucket/file.bin", "BB", Some(2))).await.unwrap();
        service.save(&save("mybucket/file.bin", "CC", Some(-1))).await.unwrap();

        assert_eq!(store.keys("mybucket").await, vec!["file.bin"]);
        assert_eq!(store.get_object("mybucket", "file.bin").await.unwrap(), "AABBCC");
    }

    #[tokio::test]
    async fn chunked_save_decodes_base64_chunks() {
        let (service, store) = service_with(&[]).await;
        for (chunk, content) in [(1, "QUE="), (-1, "QkI=")] {
            let request = SaveRequest {
                path: "mybucket/f".into(),
                content: json!(content),
                format: ContentFormat::Base64,
                chunk: Some(chunk),
            };
            service.save(&request).await.unwrap();
        }
        assert_eq!(store.get_object("mybucket", "f").await.unwrap(), "AABB");
    }

    #[tokio::test]
    async fn invalid_chunk_index_is_rejected() {
        let (service, store) = service_with(&[]).await;
        let err = service
            .save(&save("mybucket/f", "x", Some(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::InvalidChunk { chunk: 0, .. }));
        assert!(store.keys("mybucket").await.is_empty());
    }

    #[tokio::test]
    async fn strict_order_rejects_skipped_chunk() {
        let (service, store) = service_with(&[]).await;
        let service = service.with_strict_chunk_order(Duration::minutes(10));
        service.save(&save("mybucket/f", "AA", Some(1))).await.unwrap();

        let err = service
            .save(&save("mybucket/f", "CC", Some(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::InvalidChunk { chunk: 3, .. }));
        assert_eq!(store.keys("mybucket").await, vec!["f.temporary"]);

        service.save(&save("mybucket/f", "BB", Some(2))).await.unwrap();
        service.save(&save("mybucket/f", "CC", Some(-1))).await.unwrap();
        assert_eq!(store.get_object("mybucket", "f").await.unwrap(), "AABBCC");
    }

    #[tokio::test]
    async fn delete_single_object_only() {
        let (service, store) = service_with(&[("a.txt", "x"), ("a.txt.bak", "y")]).await;
        service.delete("mybucket/a.txt").await.unwrap();
        assert_eq!(store.keys("mybucket").await, vec!["a.txt.bak"]);
    }

    #[tokio::test]
    async fn delete_prefix_missing_and_root_are_noops() {
        let (service, store) = service_with(&[("dir/a.txt", "x")]).await;
        service.delete("mybucket/nope.txt").await.unwrap();
        service.delete("mybucket/dir/").await.unwrap();
        service.delete("mybucket/dir").await.unwrap();
        service.delete("/").await.unwrap();
        assert_eq!(store.keys("mybucket").await, vec!["dir/a.txt"]);
    }

    #[tokio::test]
    async fn unique_name_skips_taken_copies() {
        let (service, _) = service_with(&[("a.txt", "1"), ("a-Copy1.txt", "2")]).await;
        assert_eq!(
            service.unique_name("mybucket", "a.txt").await.unwrap(),
            "a-Copy2.txt"
        );
        assert_eq!(
            service.unique_name("mybucket", "b.txt").await.unwrap(),
            "b.txt"
        );
    }

    #[tokio::test]
    async fn copy_into_directory_gets_unique_name() {
        let (service, store) = service_with(&[("src/a.txt", "data"), ("dst/a.txt", "old")]).await;
        let entry = service.copy("mybucket/src/a.txt", "mybucket/dst").await.unwrap();
        assert_eq!(entry, ListingEntry::file("mybucket/dst/a-Copy1.txt", "a-Copy1.txt"));
        assert_eq!(
            store.get_object("mybucket", "dst/a-Copy1.txt").await.unwrap(),
            "data"
        );
    }

    #[tokio::test]
    async fn copy_across_buckets() {
        let (service, store) = service_with(&[("a.txt", "data")]).await;
        let entry = service.copy("mybucket/a.txt", "other/").await.unwrap();
        assert_eq!(entry, ListingEntry::file("other/a.txt", "a.txt"));
        assert_eq!(store.keys("other").await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn copy_into_missing_bucket_is_not_found() {
        let (service, store) = service_with(&[("a.txt", "data")]).await;
        let err = service.copy("mybucket/a.txt", "ghost/dir/").await.unwrap_err();
        assert_eq!(err.to_string(), "bucket `ghost` not found");
        assert_eq!(store.keys("mybucket").await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn copy_requires_single_source() {
        let (service, _) = service_with(&[("dir/a.txt", "x")]).await;
        assert!(matches!(
            service.copy("mybucket/missing", "mybucket/").await.unwrap_err(),
            BrowserError::NotFound(_)
        ));
        assert!(matches!(
            service.copy("mybucket/dir", "mybucket/").await.unwrap_err(),
            BrowserError::AmbiguousMatch { .. }
        ));
    }

    #[tokio::test]
    async fn rename_within_bucket() {
        let (service, store) = service_with(&[("a.txt", "data")]).await;
        let entry = service
            .rename("mybucket/a.txt", "mybucket/dir/b.txt")
            .await
            .unwrap();
        assert_eq!(entry, ListingEntry::file("mybucket/dir/b.txt", "b.txt"));
        assert_eq!(store.keys("mybucket").await, vec!["dir/b.txt"]);
    }

    #[tokio::test]
    async fn rename_into_directory_keeps_name() {
        let (service, store) = service_with(&[("a.txt", "data")]).await;
        service.rename("mybucket/a.txt", "mybucket/dir/").await.unwrap();
        assert_eq!(store.keys("mybucket").await, vec!["dir/a.txt"]);
    }

    #[tokio::test]
    async fn rename_across_buckets_is_rejected() {
        let (service, store) = service_with(&[("a.txt", "data")]).await;
        let err = service
            .rename("mybucket/a.txt", "other/a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::InvalidPath { .. }));
        assert_eq!(store.keys("mybucket").await, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn new_untitled_file_and_folder() {
        let (service, store) = service_with(&[("dir/untitled.txt", "")]).await;
        let file = service
            .new_untitled("mybucket/dir", EntryKind::File, None)
            .await
            .unwrap();
        assert_eq!(file, ListingEntry::file("mybucket/dir/untitled1.txt", "untitled1.txt"));

        let folder = service
            .new_untitled("mybucket/dir/", EntryKind::Directory, None)
            .await
            .unwrap();
        assert_eq!(
            folder,
            ListingEntry::directory("mybucket/dir/Untitled Folder/", "Untitled Folder/")
        );
        let second = service
            .new_untitled("mybucket/dir/", EntryKind::Directory, None)
            .await
            .unwrap();
        assert_eq!(second.name, "Untitled Folder 1/");

        assert_eq!(
            service.read("mybucket/dir/").await.unwrap(),
            Contents::Directory(vec![
                ListingEntry::directory("mybucket/dir/Untitled Folder/", "Untitled Folder/"),
                ListingEntry::directory("mybucket/dir/Untitled Folder 1/", "Untitled Folder 1/"),
                ListingEntry::file("mybucket/dir/untitled.txt", "untitled.txt"),
                ListingEntry::file("mybucket/dir/untitled1.txt", "untitled1.txt"),
            ])
        );
        assert_eq!(store.keys("mybucket").await.len(), 4);
    }

    #[tokio::test]
    async fn checkpoints_are_acknowledged_for_existing_files() {
        let (service, _) = service_with(&[("a.txt", "x")]).await;
        assert!(service.list_checkpoints("mybucket/a.txt").await.unwrap().is_empty());
        let checkpoint = service.create_checkpoint("mybucket/a.txt").await.unwrap();
        assert_eq!(checkpoint.id, "checkpoint");
        service
            .restore_checkpoint("mybucket/a.txt", &checkpoint.id)
            .await
            .unwrap();
        assert!(service.create_checkpoint("mybucket/b.txt").await.is_err());
    }

    /// Memory store with compose and rename switched off on request.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryStore,
        compose: bool,
        rename: bool,
    }

    #[async_trait]
    impl ObjectStore for FailingStore {
        async fn list_containers(&self) -> StoreResult<Vec<String>> {
            self.inner.list_containers().await
        }
        async fn get_container(&self, bucket: &str) -> StoreResult<()> {
            self.inner.get_container(bucket).await
        }
        async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<BlobRecord>> {
            self.inner.list_objects(bucket, prefix).await
        }
        async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
            self.inner.get_object(bucket, key).await
        }
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            data: Bytes,
            content_type: Option<&str>,
        ) -> StoreResult<BlobRecord> {
            self.inner.put_object(bucket, key, data, content_type).await
        }
        async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
            self.inner.delete_object(bucket, key).await
        }
        async fn compose_objects(
            &self,
            bucket: &str,
            dest: &str,
            sources: &[String],
        ) -> StoreResult<BlobRecord> {
            if self.compose {
                return Err(StoreError::Api {
                    status: 429,
                    message: "rate limited".into(),
                });
            }
            self.inner.compose_objects(bucket, dest, sources).await
        }
        async fn copy_object(
            &self,
            src_bucket: &str,
            src_key: &str,
            dest_bucket: &str,
            dest_key: &str,
        ) -> StoreResult<BlobRecord> {
            self.inner
                .copy_object(src_bucket, src_key, dest_bucket, dest_key)
                .await
        }
        async fn rename_object(
            &self,
            bucket: &str,
            src_key: &str,
            dest_key: &str,
        ) -> StoreResult<BlobRecord> {
            if self.rename {
                return Err(StoreError::Unsupported("rename".into()));
            }
            self.inner.rename_object(bucket, src_key, dest_key).await
        }
    }

    #[tokio::test]
    async fn backend_failure_propagates_and_leaves_temporaries() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::with_buckets(["b"]),
            compose: true,
            ..FailingStore::default()
        });
        let service = BrowserService::new(store.clone());
        service.save(&save("b/f", "AA", Some(1))).await.unwrap();

        let err = service.save(&save("b/f", "BB", Some(2))).await.unwrap_err();
        assert!(matches!(
            err,
            BrowserError::Backend(StoreError::Api { status: 429, .. })
        ));
        assert_eq!(err.to_string(), "backend returned 429: rate limited");
        assert_eq!(
            store.inner.keys("b").await,
            vec!["f.temporary", "f.temporary-2.tmp"]
        );
    }

    #[tokio::test]
    async fn move_onto_own_key_leaves_the_object() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::with_buckets(["b"]),
            rename: true,
            ..FailingStore::default()
        });
        store
            .inner
            .put_object("b", "a.txt", Bytes::from_static(b"data"), None)
            .await
            .unwrap();
        let service = BrowserService::new(store.clone());

        for target in ["b/", "b/a.txt", "/b/a.txt"] {
            let entry = service.rename("b/a.txt", target).await.unwrap();
            assert_eq!(entry, ListingEntry::file("b/a.txt", "a.txt"));
        }
        assert_eq!(store.inner.get_object("b", "a.txt").await.unwrap(), "data");
    }

    #[tokio::test]
    async fn strict_order_allows_retry_after_backend_failure() {
        let store = Arc::new(FailingStore {
            inner: MemoryStore::with_buckets(["b"]),
            compose: true,
            ..FailingStore::default()
        });
        let service = BrowserService::new(store).with_strict_chunk_order(Duration::minutes(10));
        service.save(&save("b/f", "AA", Some(1))).await.unwrap();

        for _ in 0..2 {
            let err = service.save(&save("b/f", "BB", Some(2))).await.unwrap_err();
            assert!(matches!(err, BrowserError::Backend(_)));
        }
        assert!(matches!(
            service.save(&save("b/f", "CC", Some(3))).await.unwrap_err(),
            BrowserError::InvalidChunk { chunk: 3, .. }
        ));
    }
}
