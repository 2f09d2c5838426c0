//! View helpers computed for every request before routing.

use crate::app::Snapshot;
use http::{HeaderMap, Method, Uri};
use serde_json::Value;
use std::sync::Arc;
use trellis_core::HelperValues;

/// What a helper factory can look at.
#[derive(Debug, Clone, Copy)]
pub struct HelperInput<'a> {
    /// Request method
    pub method: &'a Method,
    /// Request URI
    pub uri: &'a Uri,
    /// Request headers
    pub headers: &'a HeaderMap,
    /// State the request is served from
    pub snapshot: &'a Snapshot,
}

/// A helper factory.
pub type HelperFn = Arc<dyn Fn(&HelperInput<'_>) -> Value + Send + Sync>;

/// Named helper factories, evaluated in registration order.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: Vec<(String, HelperFn)>,
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.helpers.iter().map(|(name, _)| name))
            .finish()
    }
}

impl HelperRegistry {
    /// No helpers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in helpers:
    ///
    /// - `url`: request path and query
    /// - `method`: request method
    /// - `theme`: active theme name
    /// - `generation`: generation of the serving state
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with("url", |input| {
                Value::from(
                    input
                        .uri
                        .path_and_query()
                        .map_or_else(|| input.uri.path().to_string(), ToString::to_string),
                )
            })
            .with("method", |input| Value::from(input.method.as_str()))
            .with("theme", |input| Value::from(input.snapshot.active_theme.name()))
            .with("generation", |input| Value::from(input.snapshot.generation))
    }

    /// Add a helper, replacing any helper of the same name in place.
    pub fn register<F>(&mut self, name: impl Into<String>, helper: F)
    where
        F: Fn(&HelperInput<'_>) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let helper: HelperFn = Arc::new(helper);
        match self.helpers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = helper,
            None => self.helpers.push((name, helper)),
        }
    }

    /// Builder form of [`HelperRegistry::register`].
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&HelperInput<'_>) -> Value + Send + Sync + 'static,
    {
        self.register(name, helper);
        self
    }

    /// Helper names in evaluation order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.helpers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Evaluate every helper.
    #[must_use]
    pub fn compute(&self, input: &HelperInput<'_>) -> HelperValues {
        self.helpers
            .iter()
            .map(|(name, helper)| (name.clone(), helper(input)))
            .collect()
    }
}
