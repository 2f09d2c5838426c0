//! One-call assembly of a [`Trellis`] wired to test doubles.

use crate::config::MemoryConfigStore;
use crate::runtime::{RecordingLogControl, RecordingTerminator};
use crate::storage::ScriptedStorageDriver;
use crate::themes::{RecordingAssetMount, ScriptedThemeLoader, ThemeTree};
use serde_json::{Value, json};
use std::sync::Arc;
use trellis_core::{AssetMount, AssetSlotKind, ConfigStore, Module, StorageDriver, ThemeLoader};
use trellis_runtime::{BuildError, FsThemeLoader, HelperInput, LogControl, Terminator, Trellis};

/// Configuration document pointing at `tree`.
#[must_use]
pub fn config_document(tree: &ThemeTree, front: &str) -> Value {
    json!({
        "database": { "uri": "memory://trellis" },
        "server": { "cache": { "ttl": 120 } },
        "themes": {
            "path": tree.path(),
            "default": "classic",
            "front": front,
        },
        "logging": { "level": "info" },
    })
}

/// A built application plus handles on every double it was built with.
pub struct Harness {
    /// The application
    pub app: Arc<Trellis>,
    /// Configuration store
    pub config: Arc<MemoryConfigStore>,
    /// Storage driver
    pub storage: Arc<ScriptedStorageDriver>,
    /// Theme loader, unused when built with [`HarnessBuilder::filesystem_themes`]
    pub loader: Arc<ScriptedThemeLoader>,
    /// Fatal error sink
    pub terminator: Arc<RecordingTerminator>,
    /// Log filter control
    pub log: Arc<RecordingLogControl>,
    /// Static asset slot
    pub static_mount: Arc<RecordingAssetMount>,
    /// Style asset slot
    pub style_mount: Arc<RecordingAssetMount>,
    /// Theme base directory
    pub tree: ThemeTree,
}

impl Harness {
    /// Start from a theme tree; the front theme defaults to `classic`.
    #[must_use]
    pub fn builder(tree: ThemeTree) -> HarnessBuilder {
        HarnessBuilder {
            document: config_document(&tree, "classic"),
            tree,
            storage: ScriptedStorageDriver::new(),
            loader: ScriptedThemeLoader::new(),
            log: RecordingLogControl::new(),
            filesystem: false,
            modules: Vec::new(),
            helpers: Vec::new(),
            mounts: Vec::new(),
        }
    }
}

type TestHelper = (String, Arc<dyn Fn(&HelperInput<'_>) -> Value + Send + Sync>);

/// Builder for [`Harness`].
pub struct HarnessBuilder {
    tree: ThemeTree,
    document: Value,
    storage: ScriptedStorageDriver,
    loader: ScriptedThemeLoader,
    log: RecordingLogControl,
    filesystem: bool,
    modules: Vec<Arc<dyn Module>>,
    helpers: Vec<TestHelper>,
    mounts: Vec<Arc<dyn AssetMount>>,
}

impl HarnessBuilder {
    /// Configure `themes.front`.
    #[must_use]
    pub fn front(mut self, theme: &str) -> Self {
        self.document["themes"]["front"] = Value::from(theme);
        self
    }

    /// Replace the configuration document.
    #[must_use]
    pub fn document(mut self, document: Value) -> Self {
        self.document = document;
        self
    }

    /// Use this storage driver.
    #[must_use]
    pub fn storage(mut self, storage: ScriptedStorageDriver) -> Self {
        self.storage = storage;
        self
    }

    /// Use this scripted theme loader.
    #[must_use]
    pub fn loader(mut self, loader: ScriptedThemeLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Use this log control.
    #[must_use]
    pub fn log_control(mut self, log: RecordingLogControl) -> Self {
        self.log = log;
        self
    }

    /// Load themes from disk with [`FsThemeLoader`].
    #[must_use]
    pub const fn filesystem_themes(mut self) -> Self {
        self.filesystem = true;
        self
    }

    /// Register a module.
    #[must_use]
    pub fn module(mut self, module: Arc<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Register a helper.
    #[must_use]
    pub fn helper<F>(mut self, name: &str, helper: F) -> Self
    where
        F: Fn(&HelperInput<'_>) -> Value + Send + Sync + 'static,
    {
        let helper: Arc<dyn Fn(&HelperInput<'_>) -> Value + Send + Sync> = Arc::new(helper);
        self.helpers.push((name.to_string(), helper));
        self
    }

    /// Register an extra asset slot next to the recording ones.
    #[must_use]
    pub fn asset_mount(mut self, mount: Arc<dyn AssetMount>) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Assemble the application. Nothing is initialised yet.
    ///
    /// # Errors
    ///
    /// Propagates [`BuildError`] from module registration.
    pub fn build(self) -> Result<Harness, BuildError> {
        let config = Arc::new(MemoryConfigStore::new(self.document));
        let storage = Arc::new(self.storage);
        let loader = Arc::new(self.loader);
        let terminator = Arc::new(RecordingTerminator::new());
        let log = Arc::new(self.log);
        let static_mount = Arc::new(RecordingAssetMount::new(AssetSlotKind::Static));
        let style_mount = Arc::new(RecordingAssetMount::new(AssetSlotKind::Styles));

        let theme_loader: Arc<dyn ThemeLoader> = if self.filesystem {
            Arc::new(FsThemeLoader)
        } else {
            Arc::clone(&loader) as Arc<dyn ThemeLoader>
        };

        let mut builder = Trellis::builder()
            .config(Arc::clone(&config) as Arc<dyn ConfigStore>)
            .storage_driver(Arc::clone(&storage) as Arc<dyn StorageDriver>)
            .theme_loader(theme_loader)
            .terminator(Arc::clone(&terminator) as Arc<dyn Terminator>)
            .log_control(Arc::clone(&log) as Arc<dyn LogControl>)
            .asset_mount(Arc::clone(&static_mount) as Arc<dyn AssetMount>)
            .asset_mount(Arc::clone(&style_mount) as Arc<dyn AssetMount>);
        for module in self.modules {
            builder = builder.module(module)?;
        }
        for mount in self.mounts {
            builder = builder.asset_mount(mount);
        }
        for (name, helper) in self.helpers {
            builder = builder.helper(name, move |input: &HelperInput<'_>| helper(input));
        }

        Ok(Harness {
            app: builder.build()?,
            config,
            storage,
            loader,
            terminator,
            log,
            static_mount,
            style_mount,
            tree: self.tree,
        })
    }
}
