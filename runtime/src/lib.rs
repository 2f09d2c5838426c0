//! # Trellis Runtime
//!
//! Bootstrap runtime for the Trellis CMS core.
//!
//! This crate takes a process from "nothing loaded" to "serving": it reads
//! configuration, connects storage, discovers and activates a theme, and
//! loads and initialises modules. It also exposes the per-request pieces the
//! web layer needs (request preparation and module routing).
//!
//! ## Core Components
//!
//! - **[`Trellis`]**: the application context, built by [`TrellisBuilder`]
//! - **Orchestrator**: the ordered [`InitStep`] pipeline with single-flight
//!   reload ([`Trellis::initialise`], [`Trellis::reload_config`])
//! - **Themes**: discovery, activation with default-theme fallback, asset
//!   remounting
//! - **Modules**: registration, partially-failable init, request routing
//! - **Ambient**: file config store, reloadable log filter, termination
//!   policy, Prometheus metrics
//!
//! ## Example
//!
//! ```ignore
//! use trellis_runtime::{FileConfigStore, Trellis};
//!
//! let app = Trellis::builder()
//!     .config(Arc::new(FileConfigStore::open("conf/trellis.json").await?))
//!     .storage_driver(Arc::new(PostgresDriver::new()))
//!     .module(Arc::new(Blog::default()))?
//!     .build()?;
//!
//! let report = app.initialise(false).await?;
//! println!("serving theme {}", report.active_theme);
//! ```

/// Application context and builder
pub mod app;

/// JSON file configuration store
pub mod config_file;

/// Error types for assembly and initialization
pub mod error;

/// Per-request view helpers
pub mod helpers;

/// Reloadable log filter
pub mod logging;

/// Prometheus metrics for observability
pub mod metrics;

/// Module registry, lifecycle and routing
pub mod modules;

/// The initialization pipeline
pub mod orchestrator;

/// Fatal error handling policy
pub mod terminate;

/// Filesystem theme loader and layout renderer
pub mod theme_loader;

/// Theme discovery and activation
pub mod themes;

pub use app::{Snapshot, Trellis, TrellisBuilder};
pub use config_file::FileConfigStore;
pub use error::{BuildError, InitError};
pub use helpers::{HelperFn, HelperInput, HelperRegistry};
pub use logging::{LogControl, LoggingError, ReloadableFilter, init_subscriber};
pub use modules::{ModuleEntry, ModuleRegistry, ModuleTable, Routing, event_route_modules};
pub use orchestrator::{Completion, InitReport, InitStep};
pub use terminate::{ProcessTerminator, Terminator};
pub use theme_loader::{FsThemeLoader, LayoutRenderer};
pub use themes::{ThemeCatalog, activate_theme, discover_themes, mount_assets};
