//! Theme descriptors and the theme-facing collaborator contracts.
//!
//! - [`ThemeLoader`] turns a discovered [`ThemeDescriptor`] into a
//!   [`LoadedTheme`] ready to render pages.
//! - [`Renderer`] produces the final HTML for a routed request.
//! - [`AssetMount`] is a swappable asset-serving slot. Slots are handed to
//!   the application once, when it is built, and re-rooted at every theme
//!   activation.

use crate::about::About;
use crate::request::RequestContext;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Descriptor file name inside a theme directory.
pub const THEME_DESCRIPTOR: &str = "theme.json";

/// Theme errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThemeError {
    /// No theme of that name is registered
    #[error("Theme '{0}' is not available")]
    NotFound(String),

    /// The theme exists but could not be loaded
    #[error("Failed to load theme '{theme}': {reason}")]
    Load {
        /// Theme name
        theme: String,
        /// Loader message
        reason: String,
    },

    /// Rendering a page failed
    #[error("Render failed: {0}")]
    Render(String),
}

/// On-disk layout of a theme folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeLayout {
    /// `<folder>/<theme>/...`
    Current,
    /// Descriptor directly inside the folder; never registered
    Legacy,
}

/// A discovered theme.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeDescriptor {
    /// Unique name (directory name)
    pub name: String,
    /// Theme directory
    pub path: PathBuf,
    /// Folder the theme was discovered in
    pub folder: String,
    /// Descriptor metadata
    pub about: About,
    /// Layout the theme was discovered with
    pub layout: ThemeLayout,
}

impl ThemeDescriptor {
    /// Whether this descriptor uses the legacy layout.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.layout == ThemeLayout::Legacy
    }
}

/// Renders a routed request into a page.
pub trait Renderer: Send + Sync {
    /// Produce the page body.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Render`] if the page cannot be produced.
    fn render(&self, theme: &LoadedTheme, request: &RequestContext) -> Result<String, ThemeError>;
}

/// A theme ready to serve.
#[derive(Clone)]
pub struct LoadedTheme {
    /// What was loaded
    pub descriptor: ThemeDescriptor,
    /// The theme's own configuration block
    pub config: Value,
    renderer: Arc<dyn Renderer>,
}

impl LoadedTheme {
    /// Pair a descriptor with its renderer.
    #[must_use]
    pub fn new(descriptor: ThemeDescriptor, config: Value, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            descriptor,
            config,
            renderer,
        }
    }

    /// Theme name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Theme directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.descriptor.path
    }

    /// Root served by the static-asset slot.
    #[must_use]
    pub fn static_root(&self) -> PathBuf {
        self.descriptor.path.join("public")
    }

    /// Root served by the style slot.
    #[must_use]
    pub fn style_root(&self) -> PathBuf {
        self.descriptor.path.join("stylesheets")
    }

    /// Render a page with this theme.
    ///
    /// # Errors
    ///
    /// Propagates the renderer's [`ThemeError`].
    pub fn render(&self, request: &RequestContext) -> Result<String, ThemeError> {
        self.renderer.render(self, request)
    }
}

impl fmt::Debug for LoadedTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedTheme")
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Loads themes.
pub trait ThemeLoader: Send + Sync {
    /// Load a discovered theme.
    ///
    /// # Errors
    ///
    /// Returns [`ThemeError::Load`] if the theme is incomplete or unreadable.
    fn load<'a>(
        &'a self,
        descriptor: &'a ThemeDescriptor,
    ) -> BoxFuture<'a, Result<LoadedTheme, ThemeError>>;
}

/// The two swappable asset slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSlotKind {
    /// Images, scripts, fonts
    Static,
    /// Stylesheets
    Styles,
}

impl AssetSlotKind {
    /// Directory of `theme` this slot serves.
    #[must_use]
    pub fn root_for(self, theme: &LoadedTheme) -> PathBuf {
        match self {
            Self::Static => theme.static_root(),
            Self::Styles => theme.style_root(),
        }
    }

    /// URL prefix the slot is mounted under.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Static => "/static",
            Self::Styles => "/styles",
        }
    }
}

impl fmt::Display for AssetSlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Styles => "styles",
        })
    }
}

/// A mounted asset-serving slot that can be re-rooted in place.
pub trait AssetMount: Send + Sync {
    /// Which slot this is.
    fn kind(&self) -> AssetSlotKind;

    /// Serve `root` from now on, with the given cache lifetime in seconds.
    fn remount(&self, root: &Path, cache_ttl: u64);

    /// Current root, if any theme has been mounted.
    fn root(&self) -> Option<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};

    struct Echo;

    impl Renderer for Echo {
        fn render(
            &self,
            theme: &LoadedTheme,
            request: &RequestContext,
        ) -> Result<String, ThemeError> {
            Ok(format!("{}:{}", theme.name(), request.path()))
        }
    }

    fn theme() -> LoadedTheme {
        LoadedTheme::new(
            ThemeDescriptor {
                name: "classic".into(),
                path: PathBuf::from("/srv/themes/core/classic"),
                folder: "core".into(),
                about: About::default(),
                layout: ThemeLayout::Current,
            },
            Value::Null,
            Arc::new(Echo),
        )
    }

    #[test]
    fn asset_roots_are_inside_the_theme() {
        let theme = theme();
        assert_eq!(
            AssetSlotKind::Static.root_for(&theme),
            PathBuf::from("/srv/themes/core/classic/public")
        );
        assert_eq!(
            AssetSlotKind::Styles.root_for(&theme),
            PathBuf::from("/srv/themes/core/classic/stylesheets")
        );
    }

    #[test]
    fn render_delegates_to_renderer() {
        let request =
            RequestContext::new(Method::GET, Uri::from_static("/about"), HeaderMap::new());
        assert_eq!(theme().render(&request), Ok("classic:/about".to_string()));
    }

    #[test]
    fn slot_prefixes() {
        assert_eq!(AssetSlotKind::Static.prefix(), "/static");
        assert_eq!(AssetSlotKind::Styles.prefix(), "/styles");
        assert_eq!(AssetSlotKind::Styles.to_string(), "styles");
    }
}
