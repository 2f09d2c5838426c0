//! JSON configuration file store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use serde_json::Value;
use trellis_core::config::lookup;
use trellis_core::{BoxFuture, ConfigError, ConfigStore};

/// A [`ConfigStore`] backed by a JSON document on disk.
///
/// `load()` parses the whole file before swapping it in; a failed load keeps
/// the previous document.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    document: RwLock<Arc<Value>>,
}

impl FileConfigStore {
    /// A store for `path` with an empty document. Nothing is read until
    /// [`ConfigStore::load`] is called.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: RwLock::new(Arc::new(Value::Object(serde_json::Map::new()))),
        }
    }

    /// Create a store and read `path` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let store = Self::new(path);
        store.reload().await?;
        Ok(store)
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current document.
    #[must_use]
    pub fn document(&self) -> Arc<Value> {
        Arc::clone(&self.document.read().unwrap_or_else(PoisonError::into_inner))
    }

    async fn reload(&self) -> Result<(), ConfigError> {
        let shown = self.path.display().to_string();
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| ConfigError::Io {
                path: shown.clone(),
                reason: e.to_string(),
            })?;
        let parsed: Value = serde_json::from_slice(&raw).map_err(|e| ConfigError::Parse {
            path: shown.clone(),
            reason: e.to_string(),
        })?;
        if !parsed.is_object() {
            return Err(ConfigError::Parse {
                path: shown,
                reason: "top level is not an object".to_string(),
            });
        }

        *self.document.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(parsed);
        tracing::debug!(path = %shown, "Configuration loaded");
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, path: &str) -> Option<Value> {
        lookup(&self.document(), path).cloned()
    }

    fn load(&self) -> BoxFuture<'_, Result<(), ConfigError>> {
        Box::pin(self.reload())
    }
}
