//! The request dispatcher.
//!
//! [`DispatchLayer`] wraps the framework's own router. For every request it:
//!
//! 1. **Snapshots** the published state (503 before the first cycle completes)
//! 2. **Prepares** a fresh context: menus, client scripts, view helpers
//! 3. **Parses** form content, if any, before any module sees the request
//! 4. **Routes** the context through the initialised modules
//! 5. **Answers** from what the modules produced, or forwards downstream
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use trellis_web::DispatchLayer;
//!
//! let app = Router::new()
//!     .route("/about", get(about))
//!     .layer(DispatchLayer::new(trellis));
//! ```

use crate::error::AppError;
use crate::extractors::PageContext;
use crate::form::{FormKind, read_limited};
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use trellis_core::{LoadedTheme, RequestContext};
use trellis_runtime::{Routing, Trellis};

/// Layer installing the dispatcher in front of a service.
#[derive(Clone, Debug)]
pub struct DispatchLayer {
    app: Arc<Trellis>,
}

impl DispatchLayer {
    /// Dispatch through `app`'s modules.
    #[must_use]
    pub const fn new(app: Arc<Trellis>) -> Self {
        Self { app }
    }
}

impl<S> Layer<S> for DispatchLayer {
    type Service = DispatchService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchService {
            inner,
            app: Arc::clone(&self.app),
        }
    }
}

/// Middleware service running module dispatch.
#[derive(Clone, Debug)]
pub struct DispatchService<S> {
    inner: S,
    app: Arc<Trellis>,
}

impl<S> Service<Request> for DispatchService<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // The ready clone must be the one that gets called.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let app = Arc::clone(&self.app);

        let span = tracing::info_span!(
            "dispatch",
            method = %req.method(),
            path = %req.uri().path(),
        );

        Box::pin(
            async move {
                Ok(match dispatch(&app, inner, req).await {
                    Ok(response) => response,
                    Err(error) => error.into_response(),
                })
            }
            .instrument(span),
        )
    }
}

async fn dispatch<S>(app: &Trellis, mut inner: S, req: Request) -> Result<Response, AppError>
where
    S: Service<Request, Response = Response, Error = Infallible>,
{
    let Some(snapshot) = app.snapshot() else {
        tracing::warn!("Request received before initialization completed");
        return Err(AppError::unavailable("Site is starting up"));
    };

    let (mut parts, body) = req.into_parts();
    let mut ctx = app.prepare_request(
        &snapshot,
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
    );

    let body = match FormKind::detect(&parts.headers) {
        Some(kind) => {
            let bytes = read_limited(&parts.headers, body, snapshot.settings.form_limit).await?;
            ctx.form = Some(kind.parse(&bytes)?);
            tracing::debug!(kind = ?kind, bytes = bytes.len(), "Form parsed");
            Body::from(bytes)
        },
        None => body,
    };

    let routing = app.route_request(&snapshot, &mut ctx).await;

    if should_forward(&routing, &ctx) {
        tracing::debug!(matched = ?routing.matched, "Forwarding to downstream handler");
        parts.extensions.insert(PageContext {
            snapshot,
            request: ctx,
        });
        return Ok(match inner.call(Request::from_parts(parts, body)).await {
            Ok(response) => response,
            Err(never) => match never {},
        });
    }

    if !ctx.has_content() {
        return Err(AppError::internal("Every module handling this request failed"));
    }
    respond(&snapshot.active_theme, ctx)
}

/// Nothing was produced and nothing failed outright.
fn should_forward(routing: &Routing, ctx: &RequestContext) -> bool {
    if ctx.has_content() {
        return false;
    }
    routing.is_unclaimed() || ctx.errors.len() < routing.matched.len()
}

fn respond(theme: &LoadedTheme, mut ctx: RequestContext) -> Result<Response, AppError> {
    if let Some(raw) = ctx.body.take() {
        let mut response = (ctx.status, raw.content).into_response();
        if let Ok(value) = HeaderValue::from_str(&raw.content_type) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
        return Ok(response);
    }

    if let Some(location) = &ctx.redirect {
        let location = HeaderValue::from_str(location)
            .map_err(|e| AppError::internal("Invalid redirect target").with_source(e.into()))?;
        return Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response());
    }

    let page = theme.render(&ctx)?;
    Ok((ctx.status, Html(page)).into_response())
}
