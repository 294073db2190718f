//! Logical path handling.
//!
//! A logical path is `/`-separated and addresses the store root (`/` or empty),
//! a bucket (`bucket/`) or an object (`bucket/key...`). A trailing `/` marks a
//! directory-like prefix but an exact object match still wins.

use std::fmt;

/// A path split into its bucket and the object key inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPath {
    pub bucket: String,
    /// Empty when the path addresses the bucket root.
    pub key: String,
}

/// Renders as `bucket/key`, the form used in listing entries and responses.
impl fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Collapse repeated separators and resolve `.`/`..` segments.
///
/// A trailing separator on the input survives normalization, and any path that
/// resolves to nothing becomes the root `/`. Applying it twice changes nothing.
pub fn normalize(raw: &str) -> String {
    let absolute = raw.starts_with('/');
    let trailing = raw.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `..` above an absolute root stays at the root
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut path = segments.join("/");
    if absolute {
        path.insert(0, '/');
    }
    if trailing {
        path.push('/');
    }
    path
}

/// True for the store root, the one path that lists buckets instead of objects.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == "/"
}

/// Split a normalized, non-root path into bucket and key.
///
/// Strips one leading separator and splits on the first remaining one.
pub fn parse(path: &str) -> ParsedPath {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.split_once('/') {
        Some((bucket, key)) => ParsedPath {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        None => ParsedPath {
            bucket: path.to_string(),
            key: String::new(),
        },
    }
}

/// Final segment of an object key, ignoring a trailing separator.
pub fn basename(key: &str) -> &str {
    let trimmed = key.strip_suffix('/').unwrap_or(key);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Ensure a non-empty prefix ends with exactly one `/`. The empty prefix stays empty.
pub fn as_dir_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// Split `name.ext` into (`name`, `.ext`). Dotfiles such as `.bashrc` have no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let start = name.rfind('/').map_or(0, |idx| idx + 1);
    match name[start..].rfind('.') {
        Some(idx) if idx > 0 => name.split_at(start + idx),
        _ => (name, ""),
    }
}
