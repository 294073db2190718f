//! Resolve a logical path to a single object, a prefix, or the store root.
//!
//! Resolution always queries the backend; nothing is cached between requests.

use super::{
    browser_service::{BrowserError, BrowserResult},
    paths::{self, ParsedPath},
};
use crate::store::{BlobRecord, ObjectStore};
use tracing::debug;

#[derive(Debug)]
pub enum Location {
    /// The store root, which lists buckets rather than objects.
    Root,
    /// Exactly one object's name equals the key.
    Single(BlobRecord),
    /// Anything else: a directory-like prefix, possibly with no objects under it.
    Prefix {
        parsed: ParsedPath,
        blobs: Vec<BlobRecord>,
    },
}

/// Locate `raw` (normalized first) against the store.
///
/// A missing bucket fails with `NotFound`; a missing key inside an existing
/// bucket resolves to an empty `Prefix`.
pub async fn locate(store: &dyn ObjectStore, raw: &str) -> BrowserResult<Location> {
    let path = paths::normalize(raw);
    if paths::is_root(&path) {
        return Ok(Location::Root);
    }

    let parsed = paths::parse(&path);
    let mut blobs = store.list_objects(&parsed.bucket, &parsed.key).await?;

    let exact: Vec<usize> = blobs
        .iter()
        .enumerate()
        .filter(|(_, b)| b.name == parsed.key && !b.is_placeholder())
        .map(|(idx, _)| idx)
        .collect();
    if let [idx] = exact[..] {
        debug!(path = %parsed, "resolved to single object");
        return Ok(Location::Single(blobs.swap_remove(idx)));
    }

    debug!(path = %parsed, count = blobs.len(), "resolved to prefix");
    Ok(Location::Prefix { parsed, blobs })
}

/// Locate `raw` and insist it names exactly one object.
pub async fn locate_single(store: &dyn ObjectStore, raw: &str) -> BrowserResult<BlobRecord> {
    match locate(store, raw).await? {
        Location::Single(record) => Ok(record),
        Location::Root => Err(BrowserError::InvalidPath {
            path: raw.to_string(),
            reason: "the store root is not an object".into(),
        }),
        Location::Prefix { blobs, .. } if blobs.is_empty() => {
            Err(BrowserError::NotFound(format!("source `{}`", raw)))
        }
        Location::Prefix { blobs, .. } => Err(BrowserError::AmbiguousMatch {
            path: raw.to_string(),
            matches: blobs.len(),
        }),
    }
}

/// True when an object named exactly `key` exists in `bucket`.
pub async fn object_exists(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
) -> BrowserResult<bool> {
    let blobs = store.list_objects(bucket, key).await?;
    Ok(blobs.iter().any(|b| b.name == key))
}
