//! Storage driver contract.
//!
//! Storage is mandatory: a failed connect during initialization is fatal. The
//! core never looks inside the connection; modules that need the concrete pool
//! downcast through [`StorageHandle::as_any`].

use crate::config::DatabaseSettings;
use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The URI is not usable by this driver
    #[error("Invalid storage URI {uri}: {reason}")]
    InvalidUri {
        /// Redacted URI
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// The backend could not be reached
    #[error("Failed to connect to {uri}: {reason}")]
    Connect {
        /// Redacted URI
        uri: String,
        /// Driver message
        reason: String,
    },

    /// A query against a connected backend failed
    #[error("Storage query failed: {0}")]
    Query(String),
}

/// Pool options passed to [`StorageDriver::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Pool size upper bound
    pub max_connections: u32,
    /// Connect/acquire timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&DatabaseSettings> for ConnectOptions {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            max_connections: settings.max_connections,
            connect_timeout: Duration::from_secs(settings.connect_timeout),
        }
    }
}

/// A live connection (usually a pool).
pub trait StorageHandle: Send + Sync + 'static {
    /// Backend identifier, e.g. `postgres`.
    fn backend(&self) -> &str;

    /// Round-trip to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Query`] if the backend does not answer.
    fn ping(&self) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Downcast access to the concrete handle.
    fn as_any(&self) -> &dyn Any;
}

/// Opens [`StorageHandle`]s.
pub trait StorageDriver: Send + Sync {
    /// Connect to `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URI is rejected or the backend cannot
    /// be reached within the configured timeout.
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn StorageHandle>, StorageError>>;
}

/// Replace the password component of a URI with `***`.
///
/// ```
/// use trellis_core::storage::redact_uri;
///
/// assert_eq!(
///     redact_uri("postgres://cms:secret@db:5432/site"),
///     "postgres://cms:***@db:5432/site"
/// );
/// assert_eq!(redact_uri("postgres://db/site"), "postgres://db/site");
/// ```
#[must_use]
pub fn redact_uri(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end..];
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let authority = &rest[..authority_end];

    let Some(at) = authority.rfind('@') else {
        return uri.to_string();
    };
    let credentials = &authority[..at];
    let Some(colon) = credentials.find(':') else {
        return uri.to_string();
    };

    format!(
        "{}{}:***{}",
        &uri[..scheme_end],
        &credentials[..colon],
        &rest[at..]
    )
}
