//! # Trellis Core
//!
//! Core traits and types for the Trellis content-management core.
//!
//! This crate holds everything the bootstrap runtime and the web dispatcher
//! share without depending on each other:
//!
//! - **Collaborator contracts**: [`ConfigStore`], [`StorageDriver`],
//!   [`ThemeLoader`], [`AssetMount`], [`Renderer`]
//! - **Modules**: the [`Module`] trait, route bindings and module descriptors
//! - **Requests**: [`RequestContext`] with menus, helpers, client scripts and
//!   parsed form data
//! - **Events**: the process [`EventBus`] carrying [`SystemEvent`]s
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ ConfigStore  │   │ StorageDriver│   │ ThemeLoader  │   ← external collaborators
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────┬───────┴──────────────────┘
//!                   ▼
//!          trellis-runtime (orchestrator, registries)
//!                   │
//!                   ▼
//!          trellis-web (dispatcher, asset slots)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use trellis_core::{
//!     BoxFuture, Module, ModuleContext, ModuleError, RequestContext, Route, RouteOutcome,
//! };
//!
//! struct Blog;
//!
//! impl Module for Blog {
//!     fn name(&self) -> &str { "blog" }
//!
//!     fn routes(&self) -> Vec<Route> {
//!         vec![Route::get("show", "/blog/:slug")]
//!     }
//!
//!     fn init<'a>(&'a self, _ctx: &'a ModuleContext) -> BoxFuture<'a, Result<(), ModuleError>> {
//!         Box::pin(async { Ok(()) })
//!     }
//!
//!     fn route<'a>(
//!         &'a self,
//!         _route: &'a Route,
//!         request: &'a mut RequestContext,
//!     ) -> BoxFuture<'a, Result<RouteOutcome, ModuleError>> {
//!         Box::pin(async move {
//!             request.add_block("body", "<article>...</article>");
//!             Ok(RouteOutcome::Continue)
//!         })
//!     }
//! }
//! ```

pub mod about;
pub mod client;
pub mod config;
pub mod event_bus;
pub mod menu;
pub mod module;
pub mod request;
pub mod route;
pub mod storage;
pub mod theme;

pub use futures::future::BoxFuture;

pub use about::{About, load_about};
pub use client::ClientScripts;
pub use config::{ConfigError, ConfigStore, Settings};
pub use event_bus::{EventBus, SystemEvent};
pub use menu::{MenuItem, MenuName, MenuSet, MenuTree};
pub use module::{
    Module, ModuleContext, ModuleDescriptor, ModuleError, ModuleStatus, RouteOutcome,
};
pub use request::{ContentBlock, FormData, HelperValues, RawBody, RequestContext, RoutingError};
pub use route::{Route, RoutePattern};
pub use storage::{ConnectOptions, StorageDriver, StorageError, StorageHandle};
pub use theme::{
    AssetMount, AssetSlotKind, LoadedTheme, Renderer, ThemeDescriptor, ThemeError, ThemeLayout,
    ThemeLoader,
};

/// Escape text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_replaces_markup_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn escape_html_leaves_plain_text_alone() {
        assert_eq!(escape_html("plain text"), "plain text");
    }
}
