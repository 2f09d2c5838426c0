//! Theme discovery and activation.
//!
//! Themes live two levels below the configured base path:
//!
//! ```text
//! themes/
//!   core/
//!     classic/        → theme "classic"
//!     _partials/      reserved, skipped
//!   contrib/
//!     alpha/          → theme "alpha"
//!   old/
//!     theme.json      legacy folder: everything under old/ is skipped
//!     beta/
//! ```
//!
//! Activation resolves the requested theme, falls back to the configured
//! default once if needed, and fails fatally if the default itself cannot be
//! used. At most two load attempts ever happen.

use crate::error::InitError;
use crate::metrics::ThemeMetrics;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trellis_core::config::ThemeSettings;
use trellis_core::theme::THEME_DESCRIPTOR;
use trellis_core::{
    AssetMount, EventBus, LoadedTheme, SystemEvent, ThemeDescriptor, ThemeError, ThemeLayout,
    ThemeLoader, load_about,
};

/// Every theme found by one discovery pass, keyed by name.
///
/// Rebuilt from scratch on every pass; nothing carries over.
#[derive(Debug, Clone, Default)]
pub struct ThemeCatalog {
    themes: BTreeMap<String, ThemeDescriptor>,
    legacy: Vec<ThemeDescriptor>,
}

impl ThemeCatalog {
    /// Look up a theme.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ThemeDescriptor> {
        self.themes.get(name)
    }

    /// Whether a theme is available.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.themes.contains_key(name)
    }

    /// Theme names in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.themes.keys().cloned().collect()
    }

    /// Number of themes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.themes.len()
    }

    /// Whether no themes were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// Iterate descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ThemeDescriptor> {
        self.themes.values()
    }

    /// Legacy-layout folders seen and refused during discovery.
    #[must_use]
    pub fn legacy(&self) -> &[ThemeDescriptor] {
        &self.legacy
    }

    fn insert(&mut self, descriptor: ThemeDescriptor) {
        if descriptor.is_legacy() {
            tracing::warn!(
                folder = %descriptor.folder,
                path = %descriptor.path.display(),
                "Skipping theme folder with legacy layout"
            );
            self.legacy.push(descriptor);
            return;
        }
        if let Some(existing) = self.themes.get(&descriptor.name) {
            tracing::warn!(
                theme = %descriptor.name,
                kept = %existing.path.display(),
                ignored = %descriptor.path.display(),
                "Duplicate theme name, keeping the first one found"
            );
            return;
        }
        self.themes.insert(descriptor.name.clone(), descriptor);
    }
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Directory entries sorted by name. Unreadable directories yield nothing.
async fn sorted_entries(dir: &Path) -> Vec<(String, PathBuf, bool)> {
    let mut reader = match tokio::fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Cannot read theme directory");
            return Vec::new();
        },
    };

    let mut entries = Vec::new();
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                // Follows symlinks, unlike `DirEntry::file_type`.
                let path = entry.path();
                let is_dir = tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir());
                entries.push((entry.file_name().to_string_lossy().into_owned(), path, is_dir));
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(
                    path = %dir.display(),
                    error = %e,
                    "Error while listing theme directory"
                );
                break;
            },
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Scan `base` for themes.
///
/// A missing base path yields an empty catalog. A folder that directly holds
/// a theme descriptor uses the legacy layout and is skipped whole.
pub async fn discover_themes(base: &Path) -> ThemeCatalog {
    let mut catalog = ThemeCatalog::default();

    if !tokio::fs::metadata(base).await.is_ok_and(|m| m.is_dir()) {
        tracing::warn!(path = %base.display(), "Theme base path does not exist");
        return catalog;
    }

    for (folder, folder_path, is_dir) in sorted_entries(base).await {
        if !is_dir || is_reserved(&folder) {
            continue;
        }

        let entries = sorted_entries(&folder_path).await;
        if entries.iter().any(|(name, _, is_dir)| !is_dir && name == THEME_DESCRIPTOR) {
            let about = load_about(&folder_path, THEME_DESCRIPTOR).await;
            catalog.insert(ThemeDescriptor {
                name: folder.clone(),
                path: folder_path,
                folder,
                about,
                layout: ThemeLayout::Legacy,
            });
            continue;
        }

        for (name, path, is_dir) in entries {
            if !is_dir || is_reserved(&name) {
                continue;
            }
            let about = load_about(&path, THEME_DESCRIPTOR).await;
            catalog.insert(ThemeDescriptor {
                name,
                path,
                folder: folder.clone(),
                about,
                layout: ThemeLayout::Current,
            });
        }
    }

    tracing::info!(count = catalog.len(), themes = ?catalog.names(), "Themes discovered");
    catalog
}

async fn load(
    catalog: &ThemeCatalog,
    loader: &dyn ThemeLoader,
    name: &str,
) -> Result<LoadedTheme, ThemeError> {
    let descriptor = catalog
        .get(name)
        .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
    loader.load(descriptor).await
}

fn fatal(default: &str, error: ThemeError) -> InitError {
    match error {
        ThemeError::NotFound(_) => InitError::DefaultThemeMissing {
            theme: default.to_string(),
        },
        other => InitError::DefaultThemeLoad {
            theme: default.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Load the requested theme (the configured front theme if `name` is `None`),
/// falling back to the default theme once.
///
/// # Errors
///
/// Returns [`InitError::DefaultThemeMissing`] or
/// [`InitError::DefaultThemeLoad`] when the default theme is needed and cannot
/// be used.
pub async fn activate_theme(
    catalog: &ThemeCatalog,
    loader: &dyn ThemeLoader,
    events: &EventBus,
    settings: &ThemeSettings,
    name: Option<&str>,
) -> Result<Arc<LoadedTheme>, InitError> {
    let requested = name.unwrap_or(settings.front.as_str());
    let default = settings.default.as_str();

    let theme = match load(catalog, loader, requested).await {
        Ok(theme) => theme,
        Err(e) if requested == default => {
            tracing::error!(theme = %default, error = %e, "Default theme unusable");
            return Err(fatal(default, e));
        },
        Err(e) => {
            tracing::warn!(
                theme = %requested,
                fallback = %default,
                error = %e,
                "Theme unusable, falling back to default theme"
            );
            events.publish(SystemEvent::ThemeFallback {
                from: requested.to_string(),
                to: default.to_string(),
            });
            ThemeMetrics::record_fallback();

            load(catalog, loader, default).await.map_err(|e| {
                tracing::error!(theme = %default, error = %e, "Default theme unusable");
                fatal(default, e)
            })?
        },
    };

    tracing::info!(theme = %theme.name(), path = %theme.path().display(), "Theme activated");
    events.publish(SystemEvent::ThemeActivated {
        name: theme.name().to_string(),
    });
    Ok(Arc::new(theme))
}

/// Re-root every asset slot at `theme`.
pub fn mount_assets(mounts: &[Arc<dyn AssetMount>], theme: &LoadedTheme, cache_ttl: u64) {
    for mount in mounts {
        let root = mount.kind().root_for(theme);
        tracing::debug!(slot = %mount.kind(), root = %root.display(), "Remounting asset slot");
        mount.remount(&root, cache_ttl);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use trellis_testing::{ScriptedThemeLoader, ThemeTree};

    fn settings(front: &str) -> ThemeSettings {
        ThemeSettings {
            path: PathBuf::from("themes"),
            default: "classic".into(),
            front: front.into(),
        }
    }

    #[tokio::test]
    async fn discovers_current_layout_themes() {
        let tree = ThemeTree::new()
            .theme("core", "classic")
            .theme("contrib", "alpha")
            .theme("contrib", "_partials")
            .file("contrib", "README.md");

        let catalog = discover_themes(tree.path()).await;

        assert_eq!(catalog.names(), ["alpha", "classic"]);
        assert_eq!(catalog.get("alpha").unwrap().folder, "contrib");
        assert!(!catalog.get("classic").unwrap().is_legacy());
    }

    #[tokio::test]
    async fn legacy_folder_is_skipped_entirely() {
        let tree = ThemeTree::new()
            .theme("core", "classic")
            .theme("old", "beta")
            .legacy("old");

        let catalog = discover_themes(tree.path()).await;

        assert_eq!(catalog.names(), ["classic"]);
        assert_eq!(catalog.legacy().len(), 1);
        assert!(catalog.legacy()[0].is_legacy());
        assert_eq!(catalog.legacy()[0].folder, "old");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_themes_and_folders_are_discovered() {
        let elsewhere = ThemeTree::new().theme("shared", "alpha").theme("vendor", "beta");
        let tree = ThemeTree::new().theme("core", "classic");
        std::os::unix::fs::symlink(
            elsewhere.theme_path("shared", "alpha"),
            tree.theme_path("core", "alpha"),
        )
        .unwrap();
        std::os::unix::fs::symlink(elsewhere.path().join("vendor"), tree.path().join("vendor"))
            .unwrap();

        let catalog = discover_themes(tree.path()).await;

        assert_eq!(catalog.names(), ["alpha", "beta", "classic"]);
        assert_eq!(catalog.get("beta").unwrap().folder, "vendor");
    }

    #[tokio::test]
    async fn first_folder_wins_on_name_collision() {
        let tree = ThemeTree::new().theme("a", "classic").theme("b", "classic");
        let catalog = discover_themes(tree.path()).await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("classic").unwrap().folder, "a");
    }

    #[tokio::test]
    async fn theme_metadata_is_loaded_when_present() {
        let tree = ThemeTree::new()
            .theme_with_about("core", "classic", r#"{ "name": "Classic", "version": "2.0" }"#)
            .theme("core", "plain");

        let catalog = discover_themes(tree.path()).await;

        assert_eq!(catalog.get("classic").unwrap().about.version.as_deref(), Some("2.0"));
        assert!(catalog.get("plain").unwrap().about.is_empty());
    }

    #[tokio::test]
    async fn missing_base_path_yields_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = discover_themes(&dir.path().join("absent")).await;
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn front_theme_is_activated_when_loadable() {
        let tree = ThemeTree::new().theme("core", "classic").theme("core", "alpha");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();

        let theme = activate_theme(&catalog, &loader, &events, &settings("alpha"), None)
            .await
            .unwrap();

        assert_eq!(theme.name(), "alpha");
        assert_eq!(loader.attempts(), ["alpha"]);
        assert_eq!(
            rx.try_recv().unwrap(),
            SystemEvent::ThemeActivated { name: "alpha".into() }
        );
    }

    #[tokio::test]
    async fn missing_front_theme_falls_back_to_default() {
        let tree = ThemeTree::new().theme("core", "classic");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new();
        let events = EventBus::new();
        let mut rx = events.subscribe();

        let theme = activate_theme(&catalog, &loader, &events, &settings("alpha"), None)
            .await
            .unwrap();

        assert_eq!(theme.name(), "classic");
        assert_eq!(
            rx.try_recv().unwrap(),
            SystemEvent::ThemeFallback {
                from: "alpha".into(),
                to: "classic".into()
            }
        );
    }

    #[tokio::test]
    async fn unloadable_front_theme_falls_back_to_default() {
        let tree = ThemeTree::new().theme("core", "classic").theme("core", "alpha");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new().failing("alpha");
        let events = EventBus::new();

        let theme = activate_theme(&catalog, &loader, &events, &settings("alpha"), None)
            .await
            .unwrap();

        assert_eq!(theme.name(), "classic");
        assert_eq!(loader.attempts(), ["alpha", "classic"]);
    }

    #[tokio::test]
    async fn unloadable_default_theme_is_fatal() {
        let tree = ThemeTree::new().theme("core", "classic");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new().failing("classic");

        let err = activate_theme(&catalog, &loader, &EventBus::new(), &settings("classic"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, InitError::DefaultThemeLoad { ref theme, .. } if theme == "classic"));
        assert_eq!(loader.attempts(), ["classic"]);
    }

    #[tokio::test]
    async fn missing_default_theme_is_fatal_after_two_attempts_at_most() {
        let tree = ThemeTree::new().theme("core", "alpha");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new().failing("alpha");

        let err = activate_theme(&catalog, &loader, &EventBus::new(), &settings("alpha"), None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            InitError::DefaultThemeMissing {
                theme: "classic".into()
            }
        );
        assert_eq!(loader.attempts(), ["alpha"]);
    }

    #[tokio::test]
    async fn explicit_name_overrides_front_theme() {
        let tree = ThemeTree::new().theme("core", "classic").theme("core", "alpha");
        let catalog = discover_themes(tree.path()).await;
        let loader = ScriptedThemeLoader::new();

        let events = EventBus::new();
        let theme = activate_theme(&catalog, &loader, &events, &settings("alpha"), Some("classic"))
            .await
            .unwrap();

        assert_eq!(theme.name(), "classic");
    }
}
