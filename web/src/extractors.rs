//! Custom Axum extractors.
//!
//! Requests that no module claims are forwarded downstream with the routing
//! context attached, so framework handlers can still render through the
//! active theme:
//!
//! ```ignore
//! async fn about(page: PageContext) -> Result<Html<String>, AppError> {
//!     page.render_with(|ctx| {
//!         ctx.title = Some("About".into());
//!         ctx.add_block("body", "<p>About us</p>");
//!     })
//! }
//! ```

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts, response::Html};
use std::sync::Arc;
use trellis_core::RequestContext;
use trellis_runtime::Snapshot;

/// The dispatcher's view of a forwarded request.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// State the request was routed against
    pub snapshot: Arc<Snapshot>,
    /// Menus, helpers, scripts and form data gathered before forwarding
    pub request: RequestContext,
}

impl PageContext {
    /// Render the gathered context through the active theme.
    ///
    /// # Errors
    ///
    /// Returns a 500 [`AppError`] if the theme cannot render.
    pub fn render(&self) -> Result<Html<String>, AppError> {
        Ok(Html(self.snapshot.active_theme.render(&self.request)?))
    }

    /// Adjust the context, then render it.
    ///
    /// # Errors
    ///
    /// See [`PageContext::render`].
    pub fn render_with(
        mut self,
        fill: impl FnOnce(&mut RequestContext),
    ) -> Result<Html<String>, AppError> {
        fill(&mut self.request);
        self.render()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| AppError::internal("Dispatch layer not installed"))
    }
}
