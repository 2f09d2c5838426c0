//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use trellis_core::ModuleStatus;
use trellis_runtime::Trellis;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the process is running. It does not look at
/// initialization or storage.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness report.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    /// `ready`, `degraded` or `starting`
    pub status: &'static str,
    /// Generation of the serving state
    pub generation: Option<u64>,
    /// Active theme
    pub theme: Option<String>,
    /// Discovered themes
    pub themes: Vec<String>,
    /// Module states in registration order
    pub modules: Vec<ModuleReadiness>,
    /// Storage backend and whether it answered a ping
    pub storage: Option<StorageReadiness>,
    /// When this report was produced
    pub checked_at: DateTime<Utc>,
}

/// One module's state in a [`Readiness`] report.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReadiness {
    /// Module name
    pub name: String,
    /// Lifecycle state
    #[serde(flatten)]
    pub status: ModuleStatus,
}

/// Storage state in a [`Readiness`] report.
#[derive(Debug, Clone, Serialize)]
pub struct StorageReadiness {
    /// Backend identifier
    pub backend: String,
    /// Whether `ping` succeeded
    pub reachable: bool,
}

/// Readiness check against the published state.
///
/// # Status Codes
///
/// - 200 OK: initialised, storage reachable
/// - 503 Service Unavailable: no cycle has completed yet, or storage does not
///   answer
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "ready",
///   "generation": 2,
///   "theme": "classic",
///   "themes": ["alpha", "classic"],
///   "modules": [{ "name": "blog", "state": "initialised" }],
///   "storage": { "backend": "postgres", "reachable": true },
///   "checked_at": "2026-01-01T00:00:00Z"
/// }
/// ```
pub async fn readiness(State(app): State<Arc<Trellis>>) -> (StatusCode, Json<Readiness>) {
    let Some(snapshot) = app.snapshot() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Readiness {
                status: "starting",
                generation: None,
                theme: None,
                themes: Vec::new(),
                modules: Vec::new(),
                storage: None,
                checked_at: Utc::now(),
            }),
        );
    };

    let reachable = match snapshot.storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage ping failed");
            false
        },
    };
    let status = if reachable { "ready" } else { "degraded" };
    let code = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let report = Readiness {
        status,
        generation: Some(snapshot.generation),
        theme: Some(snapshot.active_theme.name().to_string()),
        themes: snapshot.themes.names(),
        modules: snapshot
            .modules
            .entries()
            .iter()
            .map(|entry| ModuleReadiness {
                name: entry.descriptor().name.clone(),
                status: entry.descriptor().status.clone(),
            })
            .collect(),
        storage: Some(StorageReadiness {
            backend: snapshot.storage.backend().to_string(),
            reachable,
        }),
        checked_at: Utc::now(),
    };

    (code, Json(report))
}
