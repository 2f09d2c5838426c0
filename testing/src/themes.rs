//! Theme fixtures and doubles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::TempDir;
use trellis_core::theme::THEME_DESCRIPTOR;
use trellis_core::{
    AssetMount, AssetSlotKind, BoxFuture, LoadedTheme, Renderer, RequestContext, ThemeDescriptor,
    ThemeError, ThemeLoader,
};

/// Renders `<theme>|<title>|<body region>`. Easy to assert on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRenderer;

impl Renderer for StaticRenderer {
    fn render(&self, theme: &LoadedTheme, request: &RequestContext) -> Result<String, ThemeError> {
        Ok(format!(
            "{}|{}|{}",
            theme.name(),
            request.title.as_deref().unwrap_or_default(),
            request.region("body")
        ))
    }
}

/// A [`ThemeLoader`] that never touches the filesystem.
///
/// Every load succeeds with a [`StaticRenderer`] theme except for names
/// marked with [`ScriptedThemeLoader::failing`]. Attempts are recorded in
/// order, failed ones included.
#[derive(Debug, Default)]
pub struct ScriptedThemeLoader {
    failing: HashSet<String>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedThemeLoader {
    /// A loader that accepts every theme.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to load `name`.
    #[must_use]
    pub fn failing(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Names passed to `load`, oldest first.
    #[must_use]
    pub fn attempts(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ThemeLoader for ScriptedThemeLoader {
    fn load<'a>(
        &'a self,
        descriptor: &'a ThemeDescriptor,
    ) -> BoxFuture<'a, Result<LoadedTheme, ThemeError>> {
        Box::pin(async move {
            self.attempts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(descriptor.name.clone());

            if self.failing.contains(&descriptor.name) {
                return Err(ThemeError::Load {
                    theme: descriptor.name.clone(),
                    reason: "scripted failure".to_string(),
                });
            }
            let config = descriptor
                .about
                .get("config")
                .cloned()
                .unwrap_or_default();
            Ok(LoadedTheme::new(
                descriptor.clone(),
                config,
                Arc::new(StaticRenderer),
            ))
        })
    }
}

/// Layout written by [`ThemeTree::theme`].
pub const FIXTURE_LAYOUT: &str = "<title>{{title}}</title><main>{{content}}</main>{{scripts}}";

/// A theme base directory built in a temporary folder.
///
/// ```
/// use trellis_testing::ThemeTree;
///
/// let tree = ThemeTree::new()
///     .theme("core", "classic")
///     .legacy("old");
/// assert!(tree.path().join("core/classic/templates/layout.html").is_file());
/// assert!(tree.path().join("old/theme.json").is_file());
/// ```
///
/// # Panics
///
/// Builder methods panic on filesystem errors; this is a test fixture.
#[derive(Debug)]
pub struct ThemeTree {
    dir: TempDir,
}

#[allow(clippy::expect_used)] // Fixture setup failures should abort the test
impl ThemeTree {
    /// An empty base directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create theme base directory"),
        }
    }

    /// Base path to configure as `themes.path`.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory of one theme.
    #[must_use]
    pub fn theme_path(&self, folder: &str, name: &str) -> PathBuf {
        self.dir.path().join(folder).join(name)
    }

    /// Add a complete theme: layout, `public/` and `stylesheets/`.
    #[must_use]
    pub fn theme(self, folder: &str, name: &str) -> Self {
        self.theme_with_layout(folder, name, FIXTURE_LAYOUT)
    }

    /// Add a complete theme with a custom layout template.
    #[must_use]
    pub fn theme_with_layout(self, folder: &str, name: &str, layout: &str) -> Self {
        let root = self.theme_path(folder, name);
        std::fs::create_dir_all(root.join("templates")).expect("create templates dir");
        std::fs::write(root.join("templates").join("layout.html"), layout).expect("write layout");
        std::fs::create_dir_all(root.join("public")).expect("create public dir");
        std::fs::write(root.join("public").join("theme.txt"), name).expect("write static asset");
        std::fs::create_dir_all(root.join("stylesheets")).expect("create stylesheets dir");
        std::fs::write(
            root.join("stylesheets").join("site.css"),
            format!("/* {name} */"),
        )
        .expect("write stylesheet");
        self
    }

    /// Add a complete theme with a `theme.json` descriptor.
    #[must_use]
    pub fn theme_with_about(self, folder: &str, name: &str, about: &str) -> Self {
        let tree = self.theme(folder, name);
        std::fs::write(tree.theme_path(folder, name).join(THEME_DESCRIPTOR), about)
            .expect("write theme descriptor");
        tree
    }

    /// Add a theme directory without a layout template.
    #[must_use]
    pub fn broken_theme(self, folder: &str, name: &str) -> Self {
        std::fs::create_dir_all(self.theme_path(folder, name)).expect("create theme dir");
        self
    }

    /// Mark `folder` as an old-style single-theme folder.
    #[must_use]
    pub fn legacy(self, folder: &str) -> Self {
        let root = self.dir.path().join(folder);
        std::fs::create_dir_all(&root).expect("create legacy folder");
        std::fs::write(root.join(THEME_DESCRIPTOR), "{}").expect("write legacy descriptor");
        self
    }

    /// Drop a plain file into `folder`.
    #[must_use]
    pub fn file(self, folder: &str, name: &str) -> Self {
        let root = self.dir.path().join(folder);
        std::fs::create_dir_all(&root).expect("create folder");
        std::fs::write(root.join(name), "").expect("write file");
        self
    }
}

impl Default for ThemeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`AssetMount`] that remembers every remount.
#[derive(Debug)]
pub struct RecordingAssetMount {
    kind: AssetSlotKind,
    mounts: Mutex<Vec<(PathBuf, u64)>>,
}

impl RecordingAssetMount {
    /// A slot of the given kind, initially unmounted.
    #[must_use]
    pub const fn new(kind: AssetSlotKind) -> Self {
        Self {
            kind,
            mounts: Mutex::new(Vec::new()),
        }
    }

    /// Every `(root, cache_ttl)` mounted so far.
    #[must_use]
    pub fn mounts(&self) -> Vec<(PathBuf, u64)> {
        self.mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AssetMount for RecordingAssetMount {
    fn kind(&self) -> AssetSlotKind {
        self.kind
    }

    fn remount(&self, root: &Path, cache_ttl: u64) {
        self.mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((root.to_path_buf(), cache_ttl));
    }

    fn root(&self) -> Option<PathBuf> {
        self.mounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(root, _)| root.clone())
    }
}
