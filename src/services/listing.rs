//! Directory synthesis over a flat prefix listing.
//!
//! The store has no directories. Given every object under a prefix, this turns
//! the keys one level below the prefix into file entries and the first segment
//! of anything deeper into a synthesized directory entry.

use super::paths::as_dir_prefix;
use crate::{models::contents::ListingEntry, store::BlobRecord};
use std::collections::BTreeMap;

#[derive(Default)]
struct Slot<'a> {
    /// Key of the object listed directly at this name.
    file: Option<&'a str>,
    dir: bool,
}

/// Build the immediate children of `prefix` inside `bucket`.
///
/// Blobs outside the prefix and the placeholder for the prefix itself are
/// ignored. Output is ordered by name with a directory ahead of a same-named file.
pub fn synthesize(bucket: &str, prefix: &str, blobs: &[BlobRecord]) -> Vec<ListingEntry> {
    let prefix = as_dir_prefix(prefix);
    let mut children: BTreeMap<&str, Slot<'_>> = BTreeMap::new();

    for blob in blobs {
        let Some(rest) = blob.name.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let mut segments = rest.split('/').filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            continue;
        };
        let deeper = segments.next().is_some();

        let slot = children.entry(first).or_default();
        if blob.is_placeholder() || deeper {
            slot.dir = true;
        } else {
            slot.file = Some(blob.name.as_str());
        }
    }

    let mut entries = Vec::with_capacity(children.len());
    for (name, slot) in children {
        if slot.dir {
            entries.push(ListingEntry::directory(
                format!("{}/{}{}/", bucket, prefix, name),
                format!("{}/", name),
            ));
        }
        if let Some(key) = slot.file {
            entries.push(ListingEntry::file(format!("{}/{}", bucket, key), name));
        }
    }
    entries
}

/// Listing of the store root: one directory entry per bucket.
pub fn buckets(names: &[String]) -> Vec<ListingEntry> {
    names
        .iter()
        .map(|name| ListingEntry::directory(format!("{}/", name), format!("{}/", name)))
        .collect()
}
