//! Request bodies accepted by the file-browser endpoints.

use super::contents::EntryKind;
use serde::Deserialize;
use serde_json::Value;

/// How the `content` of a save request is encoded.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Base64,
    Json,
    /// Anything else is stored verbatim as text.
    #[default]
    #[serde(other)]
    Text,
}

/// Body of a save (write) request. `chunk` is present for chunked uploads:
/// `1` opens the upload, `2, 3, ...` append, `-1` appends and finalizes.
#[derive(Deserialize, Clone, Debug)]
pub struct SaveRequest {
    pub path: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub format: ContentFormat,
    #[serde(default)]
    pub chunk: Option<i64>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub old_local_path: String,
    pub new_local_path: String,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub local_path: String,
    pub to_local_dir: String,
}

/// Body of a "new untitled" request.
#[derive(Deserialize, Clone, Debug)]
pub struct NewRequest {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub ext: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_request_defaults() {
        let req: SaveRequest =
            serde_json::from_value(json!({"path": "b/a.txt", "content": "hi"})).unwrap();
        assert_eq!(req.format, ContentFormat::Text);
        assert_eq!(req.chunk, None);
    }

    #[test]
    fn unknown_format_falls_back_to_text() {
        let req: SaveRequest = serde_json::from_value(
            json!({"path": "b/a.txt", "content": "hi", "format": "markdown", "chunk": -1}),
        )
        .unwrap();
        assert_eq!(req.format, ContentFormat::Text);
        assert_eq!(req.chunk, Some(-1));
    }

    #[test]
    fn move_and_copy_use_camel_case() {
        let mv: MoveRequest =
            serde_json::from_value(json!({"oldLocalPath": "b/a", "newLocalPath": "b/c"})).unwrap();
        assert_eq!(mv.new_local_path, "b/c");
        let cp: CopyRequest =
            serde_json::from_value(json!({"localPath": "b/a", "toLocalDir": "b/d"})).unwrap();
        assert_eq!(cp.to_local_dir, "b/d");
    }
}
