//! A configurable module that records what happened to it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use trellis_core::event_bus::EventReceiver;
use trellis_core::{
    BoxFuture, FormData, MenuName, Module, ModuleContext, ModuleError, RequestContext, Route,
    RouteOutcome, SystemEvent,
};

#[derive(Debug, Clone)]
enum Contribution {
    Title(String),
    Block { region: String, html: String },
    Menu { menu: MenuName, path: String, label: String },
    Script { key: String, url: String },
    Respond { content_type: String, body: String },
    Redirect(String),
}

#[derive(Default)]
struct Journal {
    init_calls: usize,
    settings_seen: Vec<Value>,
    routed: Vec<String>,
    last_params: Option<HashMap<String, String>>,
    last_form: Option<FormData>,
    last_helpers: Option<Value>,
    receiver: Option<EventReceiver>,
}

/// A [`Module`] assembled from builder calls.
///
/// ```
/// use trellis_core::{Module, Route};
/// use trellis_testing::RecordingModule;
///
/// let blog = RecordingModule::new("blog")
///     .route(Route::get("show", "/blog/:slug"))
///     .block("body", "<article>post</article>")
///     .finishing();
/// assert_eq!(blog.name(), "blog");
/// assert_eq!(blog.routes().len(), 1);
/// ```
pub struct RecordingModule {
    name: String,
    routes: Vec<Route>,
    init_failure: Option<String>,
    route_failure: Option<String>,
    outcome: RouteOutcome,
    contributions: Vec<Contribution>,
    subscribe: bool,
    journal: Mutex<Journal>,
}

impl std::fmt::Debug for RecordingModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingModule")
            .field("name", &self.name)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl RecordingModule {
    /// A module with no routes whose init succeeds.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            init_failure: None,
            route_failure: None,
            outcome: RouteOutcome::Continue,
            contributions: Vec::new(),
            subscribe: false,
            journal: Mutex::new(Journal::default()),
        }
    }

    /// Add a route binding.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Make init fail with `message`.
    #[must_use]
    pub fn failing_init(mut self, message: impl Into<String>) -> Self {
        self.init_failure = Some(message.into());
        self
    }

    /// Make every handler invocation fail with `message`.
    #[must_use]
    pub fn failing_route(mut self, message: impl Into<String>) -> Self {
        self.route_failure = Some(message.into());
        self
    }

    /// Stop routing after this module handles a request.
    #[must_use]
    pub const fn finishing(mut self) -> Self {
        self.outcome = RouteOutcome::Done;
        self
    }

    /// Set the page title when handling.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.contributions.push(Contribution::Title(title.into()));
        self
    }

    /// Contribute a content block when handling.
    #[must_use]
    pub fn block(mut self, region: impl Into<String>, html: impl Into<String>) -> Self {
        self.contributions.push(Contribution::Block {
            region: region.into(),
            html: html.into(),
        });
        self
    }

    /// Add a menu entry when handling.
    #[must_use]
    pub fn menu(
        mut self,
        menu: MenuName,
        path: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.contributions.push(Contribution::Menu {
            menu,
            path: path.into(),
            label: label.into(),
        });
        self
    }

    /// Register a client script when handling.
    #[must_use]
    pub fn script(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.contributions.push(Contribution::Script {
            key: key.into(),
            url: url.into(),
        });
        self
    }

    /// Answer with a raw body when handling.
    #[must_use]
    pub fn respond(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.contributions.push(Contribution::Respond {
            content_type: content_type.into(),
            body: body.into(),
        });
        self
    }

    /// Redirect when handling.
    #[must_use]
    pub fn redirect(mut self, location: impl Into<String>) -> Self {
        self.contributions.push(Contribution::Redirect(location.into()));
        self
    }

    /// Subscribe to the event bus during init.
    #[must_use]
    pub const fn subscribing(mut self) -> Self {
        self.subscribe = true;
        self
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of times init ran.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.journal().init_calls
    }

    /// `themes.front` as seen by each init call.
    #[must_use]
    pub fn fronts_seen(&self) -> Vec<Value> {
        self.journal().settings_seen.clone()
    }

    /// Ids of the routes invoked, oldest first.
    #[must_use]
    pub fn routed(&self) -> Vec<String> {
        self.journal().routed.clone()
    }

    /// Parameters of the most recent invocation.
    #[must_use]
    pub fn last_params(&self) -> Option<HashMap<String, String>> {
        self.journal().last_params.clone()
    }

    /// Form data of the most recent invocation.
    #[must_use]
    pub fn last_form(&self) -> Option<FormData> {
        self.journal().last_form.clone()
    }

    /// Helper values of the most recent invocation, as one JSON object.
    #[must_use]
    pub fn last_helpers(&self) -> Option<Value> {
        self.journal().last_helpers.clone()
    }

    /// Events delivered to the subscription made by the latest init.
    ///
    /// Stops at the first gap: a replaced bus or an empty buffer.
    #[must_use]
    pub fn received_events(&self) -> Vec<SystemEvent> {
        let mut journal = self.journal();
        let Some(receiver) = journal.receiver.as_mut() else {
            return Vec::new();
        };
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    fn contribute(&self, request: &mut RequestContext) {
        for contribution in &self.contributions {
            match contribution {
                Contribution::Title(title) => request.title = Some(title.clone()),
                Contribution::Block { region, html } => request.add_block(region, html),
                Contribution::Menu { menu, path, label } => {
                    request.menus.get_mut(*menu).add(path, label, None, 0);
                },
                Contribution::Script { key, url } => {
                    request.client.add_script(key, url);
                },
                Contribution::Respond { content_type, body } => {
                    request.respond(content_type, body.as_bytes());
                },
                Contribution::Redirect(location) => request.redirect_to(location),
            }
        }
    }
}

impl Module for RecordingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn routes(&self) -> Vec<Route> {
        self.routes.clone()
    }

    fn init<'a>(&'a self, ctx: &'a ModuleContext) -> BoxFuture<'a, Result<(), ModuleError>> {
        Box::pin(async move {
            let mut journal = self.journal();
            journal.init_calls += 1;
            journal
                .settings_seen
                .push(Value::String(ctx.settings.themes.front.clone()));
            journal.receiver = self.subscribe.then(|| ctx.events.subscribe());
            drop(journal);

            match &self.init_failure {
                Some(message) => Err(ModuleError::Init(message.clone())),
                None => Ok(()),
            }
        })
    }

    fn route<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<RouteOutcome, ModuleError>> {
        Box::pin(async move {
            {
                let mut journal = self.journal();
                journal.routed.push(route.id().to_string());
                journal.last_params = Some(request.params.clone());
                journal.last_form.clone_from(&request.form);
                journal.last_helpers = Some(Value::Object(
                    request
                        .helpers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ));
            }

            if let Some(message) = &self.route_failure {
                return Err(ModuleError::Handler {
                    route: route.id().to_string(),
                    reason: message.clone(),
                });
            }
            self.contribute(request);
            Ok(self.outcome)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use http::{HeaderMap, Method, StatusCode, Uri};

    fn request() -> RequestContext {
        RequestContext::new(Method::GET, Uri::from_static("/blog/hello"), HeaderMap::new())
    }

    #[tokio::test]
    async fn applies_contributions_in_order() {
        let module = RecordingModule::new("blog")
            .route(Route::get("show", "/blog/:slug"))
            .title("Hello")
            .block("body", "<p>one</p>")
            .block("body", "<p>two</p>")
            .menu(MenuName::Primary, "blog", "Blog")
            .script("highlight", "/static/hl.js");
        let route = module.routes().remove(0);
        let mut ctx = request();

        let outcome = Module::route(&module, &route, &mut ctx).await.unwrap();

        assert_eq!(outcome, RouteOutcome::Continue);
        assert_eq!(ctx.title.as_deref(), Some("Hello"));
        assert_eq!(ctx.region("body"), "<p>one</p><p>two</p>");
        assert!(!ctx.menus.get(MenuName::Primary).is_empty());
        assert!(ctx.client.contains("highlight"));
        assert_eq!(ctx.status, StatusCode::OK);
        assert_eq!(module.routed(), ["show"]);
    }

    #[tokio::test]
    async fn failing_route_contributes_nothing() {
        let module = RecordingModule::new("blog")
            .route(Route::new("any", "/*"))
            .block("body", "never")
            .failing_route("boom");
        let route = module.routes().remove(0);
        let mut ctx = request();

        let err = Module::route(&module, &route, &mut ctx).await.unwrap_err();

        assert!(err.to_string().contains("boom"));
        assert!(ctx.blocks.is_empty());
    }
}
