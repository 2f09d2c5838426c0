//! Storage doubles.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use trellis_core::{BoxFuture, ConnectOptions, StorageDriver, StorageError, StorageHandle};

/// A connection that lives in memory and counts pings.
#[derive(Debug, Default)]
pub struct MemoryStorageHandle {
    pings: AtomicUsize,
    uri: String,
}

impl MemoryStorageHandle {
    /// A handle remembering the URI it was opened with.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            pings: AtomicUsize::new(0),
            uri: uri.into(),
        }
    }

    /// URI passed to `connect`.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Number of `ping()` calls.
    #[must_use]
    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

impl StorageHandle for MemoryStorageHandle {
    fn backend(&self) -> &str {
        "memory"
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A [`StorageDriver`] that records every connect call.
///
/// Connections succeed with a [`MemoryStorageHandle`] unless the driver was
/// built with [`ScriptedStorageDriver::failing`]. A connect delay can be set
/// to keep a cycle in flight while a test does something else.
#[derive(Debug, Default)]
pub struct ScriptedStorageDriver {
    failure: Option<String>,
    delay: Option<Duration>,
    connects: Mutex<Vec<(String, ConnectOptions)>>,
}

impl ScriptedStorageDriver {
    /// A driver whose connections always succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection with `reason`.
    #[must_use]
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Sleep before answering each connect call.
    #[must_use]
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A connected handle without going through `connect`.
    #[must_use]
    pub fn handle(&self) -> Arc<dyn StorageHandle> {
        Arc::new(MemoryStorageHandle::new("memory://"))
    }

    /// URIs passed to `connect`, oldest first.
    #[must_use]
    pub fn connects(&self) -> Vec<String> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(uri, _)| uri.clone())
            .collect()
    }

    /// Options passed to the most recent `connect`.
    #[must_use]
    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.connects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, options)| *options)
    }
}

impl StorageDriver for ScriptedStorageDriver {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
        options: &'a ConnectOptions,
    ) -> BoxFuture<'a, Result<Arc<dyn StorageHandle>, StorageError>> {
        Box::pin(async move {
            self.connects
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((uri.to_string(), *options));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.failure {
                Some(reason) => Err(StorageError::Connect {
                    uri: uri.to_string(),
                    reason: reason.clone(),
                }),
                None => Ok(Arc::new(MemoryStorageHandle::new(uri)) as Arc<dyn StorageHandle>),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_connects_and_hands_out_memory_handles() {
        let driver = ScriptedStorageDriver::new();
        let handle = driver
            .connect("memory://one", &ConnectOptions::default())
            .await
            .unwrap();

        assert_eq!(handle.backend(), "memory");
        handle.ping().await.unwrap();
        let memory = handle.as_any().downcast_ref::<MemoryStorageHandle>().unwrap();
        assert_eq!(memory.uri(), "memory://one");
        assert_eq!(memory.pings(), 1);
        assert_eq!(driver.connects(), ["memory://one"]);
    }

    #[tokio::test]
    async fn failing_driver_reports_the_uri() {
        let driver = ScriptedStorageDriver::new().failing("refused");
        let err = driver
            .connect("memory://two", &ConnectOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Connect { ref uri, .. } if uri == "memory://two"));
    }
}
