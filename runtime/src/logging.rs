//! Reloadable log filtering.
//!
//! Initialization re-applies the `logging.level` directives on every cycle.
//! The binary installs the subscriber with [`init_subscriber`] and hands the
//! returned [`ReloadableFilter`] to the application; embedders that manage
//! their own subscriber simply don't install a [`LogControl`].

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Logging configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// The filter directives did not parse
    #[error("Invalid log directives '{directives}': {reason}")]
    InvalidDirectives {
        /// Offending directives
        directives: String,
        /// Parser message
        reason: String,
    },

    /// The subscriber could not be installed or updated
    #[error("Failed to install log filter: {0}")]
    Install(String),
}

/// Applies log filter directives at runtime.
pub trait LogControl: Send + Sync {
    /// Replace the active filter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError`] if `directives` is invalid; the previous filter
    /// stays active.
    fn apply(&self, directives: &str) -> Result<(), LoggingError>;
}

fn parse(directives: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidDirectives {
        directives: directives.to_string(),
        reason: e.to_string(),
    })
}

/// Handle onto the filter layer installed by [`init_subscriber`].
#[derive(Debug, Clone)]
pub struct ReloadableFilter {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl for ReloadableFilter {
    fn apply(&self, directives: &str) -> Result<(), LoggingError> {
        let filter = parse(directives)?;
        self.handle
            .reload(filter)
            .map_err(|e| LoggingError::Install(e.to_string()))
    }
}

/// Install the global subscriber: a reloadable [`EnvFilter`] seeded from
/// `RUST_LOG` (falling back to `default_directives`) and a `fmt` layer.
///
/// # Errors
///
/// Returns [`LoggingError`] if the fallback directives are invalid or a global
/// subscriber is already installed.
pub fn init_subscriber(default_directives: &str) -> Result<ReloadableFilter, LoggingError> {
    let initial = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse(default_directives)?,
    };
    let (filter, handle) = reload::Layer::new(initial);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(ReloadableFilter { handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directives_are_rejected() {
        let err = parse("info,trellis=loud").err();
        assert!(matches!(err, Some(LoggingError::InvalidDirectives { .. })));
    }

    #[test]
    fn valid_directives_parse() {
        assert!(parse("info,trellis_runtime=debug,sqlx=warn").is_ok());
    }

    #[test]
    fn reload_handle_swaps_filter() {
        let (layer, handle) = reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("info"));
        let _subscriber = tracing_subscriber::registry().with(layer);
        let control = ReloadableFilter { handle };

        assert!(control.apply("debug").is_ok());
        assert!(control.apply("info,trellis=loud").is_err());
    }
}
