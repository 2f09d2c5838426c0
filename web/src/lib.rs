//! Axum integration for the Trellis CMS core.
//!
//! This crate puts the request dispatcher in front of an existing Axum
//! application and serves the active theme's assets.
//!
//! # Request Flow
//!
//! ```text
//! request ──► TraceLayer
//!               ├── /health, /health/ready
//!               ├── /static/*, /styles/*   (AssetSlot, re-rooted per theme)
//!               └── DispatchLayer
//!                     helpers → form parse → module routing
//!                     ├── raw body / redirect / themed page
//!                     └── unclaimed → downstream router (+ PageContext)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trellis_web::{AssetSlots, build_router, handlers::not_found};
//!
//! let slots = AssetSlots::new();
//! let app = Trellis::builder()
//!     .config(config)
//!     .storage_driver(Arc::new(PostgresDriver::new()))
//!     .asset_mount(slots.static_files.clone())
//!     .asset_mount(slots.styles.clone())
//!     .build()?;
//! app.initialise(false).await?;
//!
//! let router = build_router(app, &slots, Router::new().fallback(not_found));
//! axum::serve(listener, router).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod form;
pub mod handlers;
pub mod router;

// Re-export key types for convenience
pub use assets::AssetSlot;
pub use dispatch::{DispatchLayer, DispatchService};
pub use error::AppError;
pub use extractors::PageContext;
pub use form::{FormError, FormKind};
pub use router::{AssetSlots, build_router};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
