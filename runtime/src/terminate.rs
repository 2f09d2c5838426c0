//! What happens when initialization fails fatally.

use crate::error::InitError;

/// Process termination policy.
///
/// The orchestrator calls [`Terminator::terminate`] once, after logging, when
/// a cycle fails with a fatal error. Implementations that return (tests,
/// embedders) leave the previously published state untouched.
pub trait Terminator: Send + Sync {
    /// Handle a fatal initialization error.
    fn terminate(&self, error: &InitError);
}

/// Exits the process with status 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, error: &InitError) {
        tracing::error!(error = %error, "Fatal initialization error, exiting");
        std::process::exit(1);
    }
}
