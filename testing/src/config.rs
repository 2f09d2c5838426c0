//! In-memory configuration store.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use trellis_core::config::lookup;
use trellis_core::{BoxFuture, ConfigError, ConfigStore};

/// A [`ConfigStore`] whose "persisted source" is a second in-memory document.
///
/// [`MemoryConfigStore::persist`] changes the source only; the change becomes
/// visible after `load()`, just like editing a file on disk.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trellis_core::ConfigStore;
/// use trellis_testing::MemoryConfigStore;
///
/// # tokio_test::block_on(async {
/// let store = MemoryConfigStore::new(json!({ "themes": { "front": "alpha" } }));
/// store.persist("themes.front", json!("beta"));
/// assert_eq!(store.get("themes.front"), Some(json!("alpha")));
///
/// store.load().await.unwrap();
/// assert_eq!(store.get("themes.front"), Some(json!("beta")));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    current: RwLock<Value>,
    persisted: Mutex<Value>,
    fail_loads: AtomicBool,
    loads: AtomicUsize,
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        if keys.peek().is_none() {
            map.insert(key.to_string(), value);
            return;
        }
        node = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

impl MemoryConfigStore {
    /// A store whose current and persisted documents are both `document`.
    #[must_use]
    pub fn new(document: Value) -> Self {
        Self {
            current: RwLock::new(document.clone()),
            persisted: Mutex::new(document),
            fail_loads: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    /// Set a value in both documents.
    pub fn set(&self, path: &str, value: Value) {
        set_path(
            &mut self.current.write().unwrap_or_else(PoisonError::into_inner),
            path,
            value.clone(),
        );
        self.persist(path, value);
    }

    /// Set a value in the persisted document only.
    pub fn persist(&self, path: &str, value: Value) {
        set_path(
            &mut self.persisted.lock().unwrap_or_else(PoisonError::into_inner),
            path,
            value,
        );
    }

    /// Make every subsequent `load()` fail with [`ConfigError::Io`].
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of `load()` calls so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, path: &str) -> Option<Value> {
        lookup(&self.current.read().unwrap_or_else(PoisonError::into_inner), path).cloned()
    }

    fn load(&self) -> BoxFuture<'_, Result<(), ConfigError>> {
        Box::pin(async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(ConfigError::Io {
                    path: "memory".to_string(),
                    reason: "load failure requested by test".to_string(),
                });
            }
            let persisted = self
                .persisted
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            *self.current.write().unwrap_or_else(PoisonError::into_inner) = persisted;
            Ok(())
        })
    }
}
