//! The module contract.
//!
//! Modules are registered explicitly, in order, when the application is
//! built. Registration order is the order modules are initialised in and the
//! order their handlers run for a request; it is never recomputed.
//!
//! The trait is dyn-compatible: asynchronous methods return explicit boxed
//! futures so modules can live in a `Vec<Arc<dyn Module>>`.

use crate::about::About;
use crate::config::Settings;
use crate::event_bus::EventBus;
use crate::request::RequestContext;
use crate::route::Route;
use crate::storage::StorageHandle;
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Module failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// The init hook failed
    #[error("Initialisation failed: {0}")]
    Init(String),

    /// A route handler failed
    #[error("Handler '{route}' failed: {reason}")]
    Handler {
        /// Route id
        route: String,
        /// Failure description
        reason: String,
    },

    /// A storage call made by the module failed
    #[error("Storage error: {0}")]
    Storage(String),
}

/// What routing does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Let later modules run too
    Continue,
    /// Stop routing after this module
    Done,
}

/// Lifecycle state of a registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Discovered, init hook not yet run
    Loaded,
    /// Init hook succeeded; takes part in routing
    Initialised,
    /// Init hook failed; excluded from routing
    Failed(String),
    /// Turned off in configuration
    Disabled,
}

impl ModuleStatus {
    /// Whether the module takes part in routing.
    #[must_use]
    pub const fn is_initialised(&self) -> bool {
        matches!(self, Self::Initialised)
    }
}

/// Registry view of one module.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    /// Module name
    pub name: String,
    /// Descriptor metadata
    pub about: About,
    /// Lifecycle state
    pub status: ModuleStatus,
    /// Route bindings, in declaration order
    pub routes: Vec<Route>,
}

/// What an init hook gets to work with.
#[derive(Clone)]
pub struct ModuleContext {
    /// Settings of the cycle being initialised
    pub settings: Arc<Settings>,
    /// Storage connection of the cycle being initialised
    pub storage: Arc<dyn StorageHandle>,
    /// Process event bus; subscriptions made here last until the next cycle
    pub events: Arc<EventBus>,
    /// This module's descriptor metadata
    pub about: About,
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("settings", &self.settings)
            .field("storage", &self.storage.backend())
            .field("about", &self.about)
            .finish_non_exhaustive()
    }
}

/// A pluggable unit contributing request handlers.
pub trait Module: Send + Sync {
    /// Unique module name. Also the name of its descriptor folder and its
    /// `modules.<name>.enabled` configuration key.
    fn name(&self) -> &str;

    /// Route bindings in priority order. Only the first matching route is
    /// invoked per request.
    fn routes(&self) -> Vec<Route>;

    /// Init hook, run once per initialization cycle.
    ///
    /// # Errors
    ///
    /// A failure marks the module failed and excludes it from routing until
    /// the next cycle. Other modules are unaffected.
    fn init<'a>(&'a self, ctx: &'a ModuleContext) -> BoxFuture<'a, Result<(), ModuleError>>;

    /// Handle a request matched by `route`.
    ///
    /// # Errors
    ///
    /// A failure is logged and recorded on the request; routing continues
    /// with the next module.
    fn route<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<RouteOutcome, ModuleError>>;
}
