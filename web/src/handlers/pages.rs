//! Themed fallback pages.

use crate::error::AppError;
use crate::extractors::PageContext;
use axum::{http::StatusCode, response::Html};
use trellis_core::escape_html;

/// Themed 404 for requests nothing handled.
///
/// Meant as the downstream router's fallback, behind the dispatch layer.
///
/// # Errors
///
/// Returns a 500 [`AppError`] if the theme cannot render.
#[allow(clippy::unused_async)]
pub async fn not_found(page: PageContext) -> Result<(StatusCode, Html<String>), AppError> {
    let path = escape_html(page.request.path());
    let html = page.render_with(|ctx| {
        ctx.status = StatusCode::NOT_FOUND;
        ctx.title = Some("Page not found".to_string());
        ctx.add_block("body", format!("<p>Nothing lives at <code>{path}</code>.</p>"));
    })?;
    Ok((StatusCode::NOT_FOUND, html))
}
