//! The application context.
//!
//! [`Trellis`] owns every collaborator and the published state. It is built
//! once by [`TrellisBuilder`] and shared as `Arc<Trellis>` with the web layer.
//!
//! # State publication
//!
//! ```text
//!  initialise() ──► stage Snapshot N+1 ──► swap ──► requests see N+1
//!                                            ▲
//!  requests already running keep Snapshot N ─┘
//! ```

use crate::error::BuildError;
use crate::helpers::{HelperInput, HelperRegistry};
use crate::logging::LogControl;
use crate::modules::{ModuleRegistry, ModuleTable, Routing, event_route_modules};
use crate::terminate::{ProcessTerminator, Terminator};
use crate::theme_loader::FsThemeLoader;
use crate::themes::ThemeCatalog;
use http::{HeaderMap, Method, Uri};
use serde_json::Value;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, PoisonError, RwLock};
use trellis_core::{
    AssetMount, ConfigStore, EventBus, LoadedTheme, Module, RequestContext, Settings,
    StorageDriver, StorageHandle, ThemeLoader,
};

/// Everything one completed initialization cycle produced.
///
/// Immutable once published.
pub struct Snapshot {
    /// Monotonic cycle counter, starting at 1
    pub generation: u64,
    /// Settings read at the start of the cycle
    pub settings: Arc<Settings>,
    /// Storage connection
    pub storage: Arc<dyn StorageHandle>,
    /// Themes discovered by the cycle
    pub themes: ThemeCatalog,
    /// The active theme
    pub active_theme: Arc<LoadedTheme>,
    /// Module states
    pub modules: ModuleTable,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("storage", &self.storage.backend())
            .field("themes", &self.themes.names())
            .field("active_theme", &self.active_theme.name())
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

/// The application context.
pub struct Trellis {
    pub(crate) config: Arc<dyn ConfigStore>,
    pub(crate) storage_driver: Arc<dyn StorageDriver>,
    pub(crate) theme_loader: Arc<dyn ThemeLoader>,
    pub(crate) asset_mounts: Vec<Arc<dyn AssetMount>>,
    pub(crate) modules: ModuleRegistry,
    pub(crate) helpers: HelperRegistry,
    pub(crate) log_control: Option<Arc<dyn LogControl>>,
    pub(crate) terminator: Arc<dyn Terminator>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) state: RwLock<Option<Arc<Snapshot>>>,
    pub(crate) gate: tokio::sync::Mutex<()>,
    pub(crate) generation: AtomicU64,
}

impl std::fmt::Debug for Trellis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trellis")
            .field("modules", &self.modules)
            .field("helpers", &self.helpers)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Trellis {
    /// Start assembling an application.
    #[must_use]
    pub fn builder() -> TrellisBuilder {
        TrellisBuilder::new()
    }

    /// The published state, if a cycle has completed.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    /// The process event bus.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The configuration store.
    #[must_use]
    pub fn config(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    /// Registered module names, in order.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.names()
    }

    /// A fresh request context with helpers computed against `snapshot`.
    #[must_use]
    pub fn prepare_request(
        &self,
        snapshot: &Snapshot,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
    ) -> RequestContext {
        let helpers = self.helpers.compute(&HelperInput {
            method: &method,
            uri: &uri,
            headers: &headers,
            snapshot,
        });
        let mut request = RequestContext::new(method, uri, headers);
        request.helpers = helpers;
        request
    }

    /// Route a prepared request through the modules of `snapshot`.
    pub async fn route_request(
        &self,
        snapshot: &Snapshot,
        request: &mut RequestContext,
    ) -> Routing {
        event_route_modules(&snapshot.modules, request).await
    }
}

/// Assembles a [`Trellis`] from an explicit list of collaborators.
///
/// # Example
///
/// ```rust,ignore
/// let app = Trellis::builder()
///     .config(Arc::new(FileConfigStore::open("conf/trellis.json").await?))
///     .storage_driver(Arc::new(PostgresDriver::new()))
///     .asset_mount(static_slot)
///     .asset_mount(style_slot)
///     .module(Arc::new(Blog::new()))?
///     .module(Arc::new(Users::new()))?
///     .build()?;
///
/// app.initialise(false).await?;
/// ```
pub struct TrellisBuilder {
    config: Option<Arc<dyn ConfigStore>>,
    storage_driver: Option<Arc<dyn StorageDriver>>,
    theme_loader: Arc<dyn ThemeLoader>,
    asset_mounts: Vec<Arc<dyn AssetMount>>,
    modules: ModuleRegistry,
    helpers: HelperRegistry,
    log_control: Option<Arc<dyn LogControl>>,
    terminator: Arc<dyn Terminator>,
    event_capacity: Option<usize>,
}

impl TrellisBuilder {
    /// A builder with the filesystem theme loader, the default helpers and
    /// the process terminator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: None,
            storage_driver: None,
            theme_loader: Arc::new(FsThemeLoader),
            asset_mounts: Vec::new(),
            modules: ModuleRegistry::new(),
            helpers: HelperRegistry::with_defaults(),
            log_control: None,
            terminator: Arc::new(ProcessTerminator),
            event_capacity: None,
        }
    }

    /// Set the configuration store.
    #[must_use]
    pub fn config(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(store);
        self
    }

    /// Set the storage driver.
    #[must_use]
    pub fn storage_driver(mut self, driver: Arc<dyn StorageDriver>) -> Self {
        self.storage_driver = Some(driver);
        self
    }

    /// Replace the theme loader.
    #[must_use]
    pub fn theme_loader(mut self, loader: Arc<dyn ThemeLoader>) -> Self {
        self.theme_loader = loader;
        self
    }

    /// Add an asset slot to re-root at every theme activation.
    #[must_use]
    pub fn asset_mount(mut self, mount: Arc<dyn AssetMount>) -> Self {
        self.asset_mounts.push(mount);
        self
    }

    /// Register a module. Registration order is init and routing order.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateModule`] if the name is taken.
    pub fn module(mut self, module: Arc<dyn Module>) -> Result<Self, BuildError> {
        self.modules.register(module)?;
        Ok(self)
    }

    /// Replace the helper registry.
    #[must_use]
    pub fn helpers(mut self, helpers: HelperRegistry) -> Self {
        self.helpers = helpers;
        self
    }

    /// Add or replace one helper.
    #[must_use]
    pub fn helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&HelperInput<'_>) -> Value + Send + Sync + 'static,
    {
        self.helpers.register(name, helper);
        self
    }

    /// Let initialization re-apply `logging.level`.
    #[must_use]
    pub fn log_control(mut self, control: Arc<dyn LogControl>) -> Self {
        self.log_control = Some(control);
        self
    }

    /// Replace the termination policy.
    #[must_use]
    pub fn terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Per-listener event buffer size.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Finish assembly.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingCollaborator`] without a configuration
    /// store or a storage driver.
    pub fn build(self) -> Result<Arc<Trellis>, BuildError> {
        let config = self
            .config
            .ok_or(BuildError::MissingCollaborator("configuration store"))?;
        let storage_driver = self
            .storage_driver
            .ok_or(BuildError::MissingCollaborator("storage driver"))?;
        let events = self
            .event_capacity
            .map_or_else(EventBus::new, EventBus::with_capacity);

        tracing::debug!(
            modules = ?self.modules,
            helpers = ?self.helpers,
            asset_mounts = self.asset_mounts.len(),
            "Application assembled"
        );

        Ok(Arc::new(Trellis {
            config,
            storage_driver,
            theme_loader: self.theme_loader,
            asset_mounts: self.asset_mounts,
            modules: self.modules,
            helpers: self.helpers,
            log_control: self.log_control,
            terminator: self.terminator,
            events: Arc::new(events),
            state: RwLock::new(None),
            gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }))
    }
}

impl Default for TrellisBuilder {
    fn default() -> Self {
        Self::new()
    }
}
