//! Module registry, lifecycle and request-time routing.
//!
//! ```text
//! ModuleRegistry (static, built once)
//!        │ load_modules(settings)
//!        ▼
//! ModuleTable ── init_modules(ctx) ──► Initialised | Failed | Disabled
//!        │
//!        ▼ per request
//! event_route_modules(table, request)
//! ```

use crate::error::BuildError;
use crate::metrics::{ModuleMetrics, RoutingMetrics};
use std::sync::Arc;
use trellis_core::{
    About, EventBus, Module, ModuleContext, ModuleDescriptor, ModuleStatus, RequestContext,
    RouteOutcome, RoutingError, Settings, StorageHandle, SystemEvent, load_about,
};

/// Descriptor file name inside a module directory.
pub const MODULE_DESCRIPTOR: &str = "module.json";

/// The statically registered module list, in registration order.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ModuleRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateModule`] if the name is taken.
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), BuildError> {
        if self.modules.iter().any(|m| m.name() == module.name()) {
            return Err(BuildError::DuplicateModule(module.name().to_string()));
        }
        self.modules.push(module);
        Ok(())
    }

    /// Registered names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Build a fresh module table for one initialization cycle.
    ///
    /// Modules disabled in `settings` are recorded as [`ModuleStatus::Disabled`].
    /// The others get their descriptor metadata from
    /// `<modules.path>/<name>/module.json` (missing files are fine) and start
    /// out [`ModuleStatus::Loaded`].
    pub async fn load_modules(&self, settings: &Settings) -> ModuleTable {
        let mut entries = Vec::with_capacity(self.modules.len());

        for module in &self.modules {
            let name = module.name().to_string();
            let (about, status) = if settings.module_enabled(&name) {
                let dir = settings.modules.path.join(&name);
                (load_about(&dir, MODULE_DESCRIPTOR).await, ModuleStatus::Loaded)
            } else {
                tracing::info!(module = %name, "Module disabled by configuration");
                (About::default(), ModuleStatus::Disabled)
            };

            entries.push(ModuleEntry {
                descriptor: ModuleDescriptor {
                    name,
                    about,
                    status,
                    routes: module.routes(),
                },
                module: Arc::clone(module),
            });
        }

        tracing::info!(count = entries.len(), "Modules loaded");
        ModuleTable { entries }
    }
}

/// One module and its state for the current cycle.
#[derive(Clone)]
pub struct ModuleEntry {
    module: Arc<dyn Module>,
    descriptor: ModuleDescriptor,
}

impl ModuleEntry {
    /// Registry view of the module.
    #[must_use]
    pub const fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// The module itself.
    #[must_use]
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.descriptor, f)
    }
}

/// Module states of one initialization cycle, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    entries: Vec<ModuleEntry>,
}

impl ModuleTable {
    /// Run every loaded module's init hook, in order.
    ///
    /// A failing hook marks that module [`ModuleStatus::Failed`]; the remaining
    /// modules are still initialised.
    pub async fn init_modules(
        &mut self,
        settings: &Arc<Settings>,
        storage: &Arc<dyn StorageHandle>,
        events: &Arc<EventBus>,
    ) {
        for entry in &mut self.entries {
            if entry.descriptor.status != ModuleStatus::Loaded {
                continue;
            }
            let name = entry.descriptor.name.clone();
            let ctx = ModuleContext {
                settings: Arc::clone(settings),
                storage: Arc::clone(storage),
                events: Arc::clone(events),
                about: entry.descriptor.about.clone(),
            };

            match entry.module.init(&ctx).await {
                Ok(()) => {
                    tracing::debug!(module = %name, "Module initialised");
                    entry.descriptor.status = ModuleStatus::Initialised;
                    events.publish(SystemEvent::ModuleInitialised { name });
                },
                Err(e) => {
                    tracing::error!(module = %name, error = %e, "Module failed to initialise");
                    ModuleMetrics::record_init_failure(&name);
                    entry.descriptor.status = ModuleStatus::Failed(e.to_string());
                    events.publish(SystemEvent::ModuleFailed {
                        name,
                        error: e.to_string(),
                    });
                },
            }
        }
    }

    /// Entries in registration order.
    #[must_use]
    pub fn entries(&self) -> &[ModuleEntry] {
        &self.entries
    }

    /// Look up a module's descriptor.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.entries
            .iter()
            .map(ModuleEntry::descriptor)
            .find(|d| d.name == name)
    }

    /// Names of modules taking part in routing.
    #[must_use]
    pub fn initialised(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.status.is_initialised())
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    /// Modules whose init hook failed, with the reason.
    #[must_use]
    pub fn failed(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.descriptor.status {
                ModuleStatus::Failed(reason) => Some((e.descriptor.name.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Outcome of routing one request through the modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routing {
    /// Modules whose handler was invoked, in invocation order
    pub matched: Vec<String>,
    /// Module that stopped routing with [`RouteOutcome::Done`]
    pub halted_by: Option<String>,
}

impl Routing {
    /// Whether no module claimed the request.
    #[must_use]
    pub fn is_unclaimed(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Route a request through the initialised modules.
///
/// Modules run in registration order; each runs at most once, through the
/// first of its routes that matches the path and accepts the method. A handler
/// error is logged and recorded in `request.errors`, and routing moves on.
pub async fn event_route_modules(table: &ModuleTable, request: &mut RequestContext) -> Routing {
    let mut routing = Routing::default();
    let path = request.path().to_string();

    for entry in &table.entries {
        if !entry.descriptor.status.is_initialised() {
            continue;
        }
        let Some((route, params)) = entry
            .descriptor
            .routes
            .iter()
            .filter(|route| route.accepts(&request.method))
            .find_map(|route| route.matches(&path).map(|params| (route, params)))
        else {
            continue;
        };

        let name = &entry.descriptor.name;
        tracing::debug!(
            module = %name,
            route = %route.id(),
            pattern = %route.pattern(),
            "Routing to module"
        );
        request.params = params;
        routing.matched.push(name.clone());

        match entry.module.route(route, request).await {
            Ok(RouteOutcome::Continue) => {},
            Ok(RouteOutcome::Done) => {
                routing.halted_by = Some(name.clone());
                break;
            },
            Err(e) => {
                tracing::error!(
                    module = %name,
                    route = %route.id(),
                    error = %e,
                    "Module handler failed"
                );
                request.errors.push(RoutingError {
                    module: name.clone(),
                    message: e.to_string(),
                });
            },
        }
    }

    request.params.clear();
    RoutingMetrics::record_request(!routing.is_unclaimed());
    routing
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Uri};
    use serde_json::json;
    use trellis_core::Route;
    use trellis_testing::{RecordingModule, ScriptedStorageDriver};

    async fn context() -> (Arc<Settings>, Arc<dyn StorageHandle>, Arc<EventBus>) {
        let storage = ScriptedStorageDriver::new().handle();
        (Arc::new(Settings::default()), storage, Arc::new(EventBus::new()))
    }

    fn request(method: Method, path: &'static str) -> RequestContext {
        RequestContext::new(method, Uri::from_static(path), HeaderMap::new())
    }

    async fn initialised(registry: &ModuleRegistry) -> ModuleTable {
        let (settings, storage, events) = context().await;
        let mut table = registry.load_modules(&settings).await;
        table.init_modules(&settings, &storage, &events).await;
        table
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(RecordingModule::new("blog"))).unwrap();
        let err = registry
            .register(Arc::new(RecordingModule::new("blog")))
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateModule("blog".into()));
        assert_eq!(registry.names(), ["blog"]);
    }

    #[tokio::test]
    async fn failing_init_does_not_stop_later_modules() {
        let a = Arc::new(RecordingModule::new("a"));
        let b = Arc::new(RecordingModule::new("b").failing_init("no schema"));
        let c = Arc::new(RecordingModule::new("c"));
        let mut registry = ModuleRegistry::new();
        for m in [&a, &b, &c] {
            registry.register(Arc::clone(m) as Arc<dyn Module>).unwrap();
        }

        let table = initialised(&registry).await;

        assert_eq!(table.initialised(), ["a", "c"]);
        assert_eq!(table.failed().len(), 1);
        assert_eq!(table.failed()[0].0, "b");
        assert!(table.failed()[0].1.contains("no schema"));
        assert_eq!(c.init_calls(), 1);
    }

    #[tokio::test]
    async fn disabled_modules_are_not_initialised() {
        let blog = Arc::new(RecordingModule::new("blog"));
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::clone(&blog) as Arc<dyn Module>).unwrap();

        let settings = Arc::new(Settings::from_value(&json!({
            "modules": { "blog": { "enabled": false } }
        })));
        let (_, storage, events) = context().await;
        let mut table = registry.load_modules(&settings).await;
        table.init_modules(&settings, &storage, &events).await;

        assert_eq!(table.get("blog").unwrap().status, ModuleStatus::Disabled);
        assert_eq!(blog.init_calls(), 0);
    }

    #[tokio::test]
    async fn module_metadata_is_loaded_from_descriptor_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(
            dir.path().join("blog").join(MODULE_DESCRIPTOR),
            r#"{ "name": "Blog", "version": "0.3.0" }"#,
        )
        .unwrap();

        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(RecordingModule::new("blog"))).unwrap();
        registry.register(Arc::new(RecordingModule::new("user"))).unwrap();

        let settings = Settings::from_value(&json!({ "modules": { "path": dir.path() } }));
        let table = registry.load_modules(&settings).await;

        assert_eq!(table.get("blog").unwrap().about.version.as_deref(), Some("0.3.0"));
        assert!(table.get("user").unwrap().about.is_empty());
        assert_eq!(table.get("user").unwrap().status, ModuleStatus::Loaded);
    }

    #[tokio::test]
    async fn routes_in_registration_order_skipping_failed_modules() {
        let a = Arc::new(RecordingModule::new("a").route(Route::get("page", "/page/:id")));
        let b = Arc::new(
            RecordingModule::new("b")
                .route(Route::get("page", "/page/:id"))
                .failing_init("broken"),
        );
        let c = Arc::new(RecordingModule::new("c").route(Route::new("any", "/page/*")));
        let mut registry = ModuleRegistry::new();
        for m in [&a, &b, &c] {
            registry.register(Arc::clone(m) as Arc<dyn Module>).unwrap();
        }
        let table = initialised(&registry).await;

        let mut ctx = request(Method::GET, "/page/7");
        let routing = event_route_modules(&table, &mut ctx).await;

        assert_eq!(routing.matched, ["a", "c"]);
        assert_eq!(routing.halted_by, None);
        assert_eq!(a.routed(), ["page"]);
        assert!(b.routed().is_empty());
        assert_eq!(c.routed(), ["any"]);
        assert_eq!(a.last_params().unwrap()["id"], "7");
        assert_eq!(c.last_params().unwrap()["*"], "7");
    }

    #[tokio::test]
    async fn unmatched_request_is_unclaimed() {
        let a = Arc::new(RecordingModule::new("a").route(Route::get("page", "/page/:id")));
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::clone(&a) as Arc<dyn Module>).unwrap();
        let table = initialised(&registry).await;

        let mut ctx = request(Method::POST, "/page/7");
        let routing = event_route_modules(&table, &mut ctx).await;

        assert!(routing.is_unclaimed());
        assert!(a.routed().is_empty());
    }

    #[tokio::test]
    async fn first_matching_route_wins_within_a_module() {
        let a = Arc::new(
            RecordingModule::new("a")
                .route(Route::get("specific", "/blog/new"))
                .route(Route::get("generic", "/blog/:slug")),
        );
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::clone(&a) as Arc<dyn Module>).unwrap();
        let table = initialised(&registry).await;

        let mut ctx = request(Method::GET, "/blog/new");
        event_route_modules(&table, &mut ctx).await;

        assert_eq!(a.routed(), ["specific"]);
    }

    #[tokio::test]
    async fn done_stops_routing() {
        let a = Arc::new(RecordingModule::new("a").route(Route::new("x", "/")).finishing());
        let b = Arc::new(RecordingModule::new("b").route(Route::new("x", "/")));
        let mut registry = ModuleRegistry::new();
        for m in [&a, &b] {
            registry.register(Arc::clone(m) as Arc<dyn Module>).unwrap();
        }
        let table = initialised(&registry).await;

        let mut ctx = request(Method::GET, "/");
        let routing = event_route_modules(&table, &mut ctx).await;

        assert_eq!(routing.matched, ["a"]);
        assert_eq!(routing.halted_by.as_deref(), Some("a"));
        assert!(b.routed().is_empty());
    }

    #[tokio::test]
    async fn handler_errors_are_recorded_and_routing_continues() {
        let a = Arc::new(
            RecordingModule::new("a")
                .route(Route::new("x", "/"))
                .failing_route("boom"),
        );
        let b = Arc::new(RecordingModule::new("b").route(Route::new("x", "/")));
        let mut registry = ModuleRegistry::new();
        for m in [&a, &b] {
            registry.register(Arc::clone(m) as Arc<dyn Module>).unwrap();
        }
        let table = initialised(&registry).await;

        let mut ctx = request(Method::GET, "/");
        let routing = event_route_modules(&table, &mut ctx).await;

        assert_eq!(routing.matched, ["a", "b"]);
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].module, "a");
        assert!(ctx.errors[0].message.contains("boom"));
    }
}
