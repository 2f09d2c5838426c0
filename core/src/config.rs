//! Configuration store contract and typed settings.
//!
//! The store itself is an external collaborator: anything that can answer a
//! dotted key-path lookup and re-read its persisted source. [`Settings`] is the
//! typed snapshot the runtime extracts from a store at the start of every
//! initialization cycle.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while (re)loading a configuration store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The persisted source could not be read
    #[error("Failed to read configuration from {path}: {reason}")]
    Io {
        /// Location of the source
        path: String,
        /// Underlying I/O failure
        reason: String,
    },

    /// The persisted source was read but is not a valid document
    #[error("Failed to parse configuration {path}: {reason}")]
    Parse {
        /// Location of the source
        path: String,
        /// Parser message
        reason: String,
    },
}

/// Key-path configuration lookup.
///
/// Paths are dot-separated (`themes.front`, `database.uri`). Implementations
/// must make `load()` replace the whole in-memory document at once so that a
/// concurrent `get` never observes a half-loaded tree.
pub trait ConfigStore: Send + Sync {
    /// Look up the value at a dotted path.
    fn get(&self, path: &str) -> Option<Value>;

    /// Re-read the persisted source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the source cannot be read or parsed. The
    /// previous document stays in place on error.
    fn load(&self) -> BoxFuture<'_, Result<(), ConfigError>>;
}

/// Walk a JSON document along a dotted path.
///
/// An empty path returns the root.
#[must_use]
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |node, key| node.get(key))
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Connection URI handed to the storage driver
    pub uri: String,
    /// Pool size upper bound
    pub max_connections: u32,
    /// Connect/acquire timeout in seconds
    pub connect_timeout: u64,
}

/// Theme discovery and selection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSettings {
    /// Base path scanned for theme folders
    pub path: PathBuf,
    /// Theme that must always be loadable
    pub default: String,
    /// Theme requested for the public site
    pub front: String,
}

/// Module discovery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSettings {
    /// Base path holding per-module descriptor folders
    pub path: PathBuf,
    /// Explicit `modules.<name>.enabled` flags
    pub enabled: HashMap<String, bool>,
}

/// Typed settings snapshot taken from a [`ConfigStore`].
///
/// Every field has a default so that an empty store still yields a usable
/// value; whether the defaults point at anything real is decided later by the
/// initialization steps that use them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Storage backend
    pub database: DatabaseSettings,
    /// Asset cache TTL in seconds (`server.cache.ttl`)
    pub cache_ttl: u64,
    /// Themes
    pub themes: ThemeSettings,
    /// Modules
    pub modules: ModuleSettings,
    /// Tracing filter directives (`logging.level`)
    pub logging_level: String,
    /// Upper bound for buffered form bodies, in bytes
    pub form_limit: usize,
}

impl Settings {
    /// Default database URI.
    pub const DEFAULT_DATABASE_URI: &'static str = "postgres://localhost:5432/trellis";
    /// Default theme name.
    pub const DEFAULT_THEME: &'static str = "classic";

    /// Extract settings from a configuration store.
    #[must_use]
    pub fn from_store(store: &dyn ConfigStore) -> Self {
        Self::from_lookup(|path| store.get(path))
    }

    /// Extract settings from a JSON document.
    #[must_use]
    pub fn from_value(root: &Value) -> Self {
        Self::from_lookup(|path| lookup(root, path).cloned())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<Value>) -> Self {
        let string = |path: &str| get(path).and_then(|v| v.as_str().map(str::to_owned));
        let number = |path: &str| get(path).and_then(|v| v.as_u64());

        let default_theme =
            string("themes.default").unwrap_or_else(|| Self::DEFAULT_THEME.to_string());

        let enabled = get("modules")
            .and_then(|v| v.as_object().cloned())
            .map(|modules| {
                modules
                    .iter()
                    .filter_map(|(name, entry)| {
                        entry
                            .get("enabled")
                            .and_then(Value::as_bool)
                            .map(|flag| (name.clone(), flag))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            database: DatabaseSettings {
                uri: string("database.uri")
                    .unwrap_or_else(|| Self::DEFAULT_DATABASE_URI.to_string()),
                max_connections: number("database.max_connections")
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(10),
                connect_timeout: number("database.connect_timeout").unwrap_or(30),
            },
            cache_ttl: number("server.cache.ttl").unwrap_or(3600),
            themes: ThemeSettings {
                path: string("themes.path").map_or_else(|| PathBuf::from("themes"), PathBuf::from),
                front: string("themes.front").unwrap_or_else(|| default_theme.clone()),
                default: default_theme,
            },
            modules: ModuleSettings {
                path: string("modules.path")
                    .map_or_else(|| PathBuf::from("modules"), PathBuf::from),
                enabled,
            },
            logging_level: string("logging.level").unwrap_or_else(|| "info".to_string()),
            form_limit: number("server.form_limit")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(1024 * 1024),
        }
    }

    /// Whether a module is enabled. Modules without an explicit flag are.
    #[must_use]
    pub fn module_enabled(&self, name: &str) -> bool {
        self.modules.enabled.get(name).copied().unwrap_or(true)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_value(&Value::Null)
    }
}
