//! Doubles for the runtime's ambient policies.

use std::sync::{Mutex, PoisonError};
use trellis_runtime::{InitError, LogControl, LoggingError, Terminator};

/// A [`Terminator`] that records fatal errors instead of exiting.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    errors: Mutex<Vec<InitError>>,
}

impl RecordingTerminator {
    /// A terminator with nothing recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fatal error seen, oldest first.
    #[must_use]
    pub fn errors(&self) -> Vec<InitError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether `terminate` was called at all.
    #[must_use]
    pub fn terminated(&self) -> bool {
        !self
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, error: &InitError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}

/// A [`LogControl`] that records the directives it is asked to apply.
///
/// Directives listed with [`RecordingLogControl::rejecting`] fail with
/// [`LoggingError::InvalidDirectives`] and are not recorded as applied.
#[derive(Debug, Default)]
pub struct RecordingLogControl {
    rejected: Vec<String>,
    applied: Mutex<Vec<String>>,
}

impl RecordingLogControl {
    /// Accepts every directive string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `directives`.
    #[must_use]
    pub fn rejecting(mut self, directives: impl Into<String>) -> Self {
        self.rejected.push(directives.into());
        self
    }

    /// Successfully applied directives, oldest first.
    #[must_use]
    pub fn applied(&self) -> Vec<String> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogControl for RecordingLogControl {
    fn apply(&self, directives: &str) -> Result<(), LoggingError> {
        if self.rejected.iter().any(|r| r == directives) {
            return Err(LoggingError::InvalidDirectives {
                directives: directives.to_string(),
                reason: "rejected by test".to_string(),
            });
        }
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(directives.to_string());
        Ok(())
    }
}
