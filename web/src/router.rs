//! Router assembly.

use crate::assets::AssetSlot;
use crate::dispatch::DispatchLayer;
use crate::handlers::{health_check, readiness};
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use trellis_core::AssetSlotKind;
use trellis_runtime::Trellis;

/// The two asset slots, to register with the application builder and mount
/// in the router.
#[derive(Debug, Clone)]
pub struct AssetSlots {
    /// Serves the active theme's `public/` directory
    pub static_files: Arc<AssetSlot>,
    /// Serves the active theme's `stylesheets/` directory
    pub styles: Arc<AssetSlot>,
}

impl AssetSlots {
    /// Two unmounted slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            static_files: AssetSlot::new(AssetSlotKind::Static),
            styles: AssetSlot::new(AssetSlotKind::Styles),
        }
    }
}

impl Default for AssetSlots {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the full HTTP surface.
///
/// ```text
/// /health          liveness
/// /health/ready    readiness
/// /static/*        active theme public/
/// /styles/*        active theme stylesheets/
/// everything else  DispatchLayer → downstream
/// ```
///
/// Give `downstream` its own fallback (for example [`not_found`]) so that
/// unclaimed requests still render through the theme.
///
/// [`not_found`]: crate::handlers::not_found
pub fn build_router(app: Arc<Trellis>, slots: &AssetSlots, downstream: Router) -> Router {
    let health = Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness))
        .with_state(Arc::clone(&app));

    let site = downstream.layer(DispatchLayer::new(app));

    Router::new()
        .merge(health)
        .nest_service(AssetSlotKind::Static.prefix(), slots.static_files.service())
        .nest_service(AssetSlotKind::Styles.prefix(), slots.styles.service())
        .fallback_service(site)
        .layer(TraceLayer::new_for_http())
}
