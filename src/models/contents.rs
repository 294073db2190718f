//! Listing entries and file models returned to the browser.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

/// One row of a directory listing.
///
/// Directory entries always carry a trailing `/` in both `path` and `name`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    pub name: String,
}

impl ListingEntry {
    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            path: path.into(),
            name: name.into(),
        }
    }

    pub fn directory(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Directory,
            path: path.into(),
            name: name.into(),
        }
    }
}

/// A downloaded file, payload base64-encoded.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileModel {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub mimetype: String,
    pub content: String,
}

/// Result of reading a path: either one file or a directory listing.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Contents {
    File(FileModel),
    Directory(Vec<ListingEntry>),
}

/// Checkpoint descriptor exposed for drive clients that expect one.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckpointModel {
    pub id: String,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_contents_serialize_with_type_tag() {
        let contents = Contents::Directory(vec![ListingEntry::directory("b/dir/", "dir/")]);
        assert_eq!(
            serde_json::to_value(&contents).unwrap(),
            json!({
                "type": "directory",
                "content": [{"type": "directory", "path": "b/dir/", "name": "dir/"}]
            })
        );
    }

    #[test]
    fn file_contents_serialize_with_nested_model() {
        let contents = Contents::File(FileModel {
            path: "b/a.txt".into(),
            kind: EntryKind::File,
            mimetype: "text/plain".into(),
            content: "aGk=".into(),
        });
        assert_eq!(
            serde_json::to_value(&contents).unwrap(),
            json!({
                "type": "file",
                "content": {
                    "path": "b/a.txt",
                    "type": "file",
                    "mimetype": "text/plain",
                    "content": "aGk="
                }
            })
        );
    }
}
