//! # Trellis Testing
//!
//! Test doubles and fixtures for the Trellis CMS core.
//!
//! This crate provides:
//! - In-memory implementations of the core collaborator traits
//!   ([`MemoryConfigStore`], [`ScriptedStorageDriver`], [`ScriptedThemeLoader`])
//! - A temporary theme directory builder ([`ThemeTree`])
//! - A configurable module that records its calls ([`RecordingModule`])
//! - Non-exiting runtime policies ([`RecordingTerminator`], [`RecordingLogControl`])
//! - [`Harness`], which wires all of the above into a [`trellis_runtime::Trellis`]
//!
//! ## Example
//!
//! ```ignore
//! use trellis_testing::{Harness, RecordingModule, ThemeTree};
//!
//! #[tokio::test]
//! async fn falls_back_to_default_theme() {
//!     let tree = ThemeTree::new().theme("core", "classic");
//!     let harness = Harness::builder(tree).front("alpha").build()?;
//!
//!     let report = harness.app.initialise(false).await?;
//!     assert_eq!(report.active_theme, "classic");
//! }
//! ```

/// In-memory configuration store
pub mod config;

/// Application assembly for tests
pub mod harness;

/// Recording module
pub mod modules;

/// Runtime policy doubles
pub mod runtime;

/// Storage doubles
pub mod storage;

/// Theme fixtures and doubles
pub mod themes;

pub use config::MemoryConfigStore;
pub use harness::{Harness, HarnessBuilder, config_document};
pub use modules::RecordingModule;
pub use runtime::{RecordingLogControl, RecordingTerminator};
pub use storage::{MemoryStorageHandle, ScriptedStorageDriver};
pub use themes::{
    FIXTURE_LAYOUT, RecordingAssetMount, ScriptedThemeLoader, StaticRenderer, ThemeTree,
};
