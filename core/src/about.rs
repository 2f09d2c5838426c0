//! Descriptor ("about") metadata for themes and modules.
//!
//! Descriptor files are read opportunistically: a missing or malformed file
//! leaves the metadata empty and is never reported as an error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Metadata read from a theme or module descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct About {
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Version string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Any other keys present in the descriptor
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl About {
    /// Whether nothing was loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.description.is_none()
            && self.author.is_none()
            && self.extra.is_empty()
    }

    /// Look up an extra descriptor key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Load the descriptor `file_name` from `dir`.
///
/// Returns an empty [`About`] if the file is absent, unreadable, or not a JSON
/// object.
pub async fn load_about(dir: &Path, file_name: &str) -> About {
    let path = dir.join(file_name);
    let raw = match tokio::fs::read(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No descriptor file");
            return About::default();
        },
    };

    match serde_json::from_slice::<About>(&raw) {
        Ok(about) => about,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Ignoring unparseable descriptor");
            About::default()
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_known_and_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("theme.json"),
            r#"{ "name": "Classic", "version": "1.2.0", "layouts": ["home"] }"#,
        )
        .unwrap();

        let about = load_about(dir.path(), "theme.json").await;

        assert_eq!(about.name.as_deref(), Some("Classic"));
        assert_eq!(about.version.as_deref(), Some("1.2.0"));
        assert_eq!(about.get("layouts"), Some(&serde_json::json!(["home"])));
    }

    #[tokio::test]
    async fn missing_file_yields_empty_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let about = load_about(dir.path(), "module.json").await;
        assert!(about.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_yields_empty_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module.json"), "{ not json").unwrap();
        let about = load_about(dir.path(), "module.json").await;
        assert!(about.is_empty());
    }

    #[tokio::test]
    async fn non_object_document_yields_empty_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("module.json"), "[1, 2, 3]").unwrap();
        let about = load_about(dir.path(), "module.json").await;
        assert!(about.is_empty());
    }
}
