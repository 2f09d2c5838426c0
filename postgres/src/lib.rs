//! `PostgreSQL` storage driver for Trellis.
//!
//! Implements [`StorageDriver`] on top of an sqlx connection pool. The core
//! only ever sees `Arc<dyn StorageHandle>`; modules that need to run queries
//! downcast to [`PostgresHandle`] and borrow its [`PgPool`].
//!
//! # Example
//!
//! ```ignore
//! use trellis_postgres::{PostgresDriver, PostgresHandle};
//!
//! let app = Trellis::builder()
//!     .storage_driver(Arc::new(PostgresDriver::new()))
//!     // ...
//!     .build()?;
//!
//! // Later, inside a module:
//! let pool = snapshot
//!     .storage
//!     .as_any()
//!     .downcast_ref::<PostgresHandle>()
//!     .map(PostgresHandle::pool);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::any::Any;
use std::sync::Arc;
use trellis_core::storage::redact_uri;
use trellis_core::{BoxFuture, ConnectOptions, StorageDriver, StorageError, StorageHandle};

/// URI schemes accepted by [`PostgresDriver`].
pub const SCHEMES: [&str; 2] = ["postgres", "postgresql"];

/// Backend identifier reported by [`PostgresHandle`].
pub const BACKEND: &str = "postgres";

/// Connects pooled `PostgreSQL` handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    /// Create the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Reject URIs this driver cannot open, before touching the network.
///
/// # Errors
///
/// Returns [`StorageError::InvalidUri`] when the scheme is missing or is not
/// one of [`SCHEMES`].
pub fn validate_uri(uri: &str) -> Result<(), StorageError> {
    let invalid = |reason: String| StorageError::InvalidUri {
        uri: redact_uri(uri),
        reason,
    };

    let Some((scheme, rest)) = uri.split_once("://") else {
        return Err(invalid("missing scheme".to_string()));
    };
    if !SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return Err(invalid(format!("unsupported scheme '{scheme}'")));
    }
    if rest.is_empty() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

impl StorageDriver for PostgresDriver {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn StorageHandle>, StorageError>> {
        Box::pin(async move {
            validate_uri(uri)?;
            let redacted = redact_uri(uri);

            tracing::debug!(
                uri = %redacted,
                max_connections = options.max_connections,
                timeout_ms = options.connect_timeout.as_millis(),
                "Connecting to PostgreSQL"
            );

            let pool = PgPoolOptions::new()
                .max_connections(options.max_connections)
                .acquire_timeout(options.connect_timeout)
                .connect(uri)
                .await
                .map_err(|e| StorageError::Connect {
                    uri: redacted.clone(),
                    reason: e.to_string(),
                })?;

            tracing::info!(uri = %redacted, "Connected to PostgreSQL");
            Ok(Arc::new(PostgresHandle::from_pool(pool)) as Arc<dyn StorageHandle>)
        })
    }
}

/// A pooled `PostgreSQL` connection.
#[derive(Debug, Clone)]
pub struct PostgresHandle {
    pool: PgPool,
}

impl PostgresHandle {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StorageHandle for PostgresHandle {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(|e| StorageError::Query(e.to_string()))
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
