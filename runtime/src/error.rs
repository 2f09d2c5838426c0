//! Error types for application assembly and initialization.

use crate::orchestrator::InitStep;
use thiserror::Error;
use trellis_core::{ConfigError, StorageError};

/// Errors that stop an initialization cycle.
///
/// Every variant is fatal: recoverable conditions (a missing front theme, a
/// failing module) are handled by the component that owns them and never
/// surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// A forced configuration reload failed
    #[error("Configuration reload failed: {0}")]
    ConfigLoad(#[from] ConfigError),

    /// The storage backend could not be connected
    #[error("Storage connection failed: {0}")]
    StorageConnect(#[from] StorageError),

    /// The default theme is not among the discovered themes
    #[error("Default theme '{theme}' is not available")]
    DefaultThemeMissing {
        /// Configured default theme
        theme: String,
    },

    /// The default theme was found but failed to load
    #[error("Default theme '{theme}' failed to load: {reason}")]
    DefaultThemeLoad {
        /// Configured default theme
        theme: String,
        /// Loader message
        reason: String,
    },

    /// The pipeline finished without a step producing its output
    #[error("Initialization step '{0}' produced no result")]
    Incomplete(InitStep),
}

impl InitError {
    /// Whether the error terminates the process.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::ConfigLoad(_)
            | Self::StorageConnect(_)
            | Self::DefaultThemeMissing { .. }
            | Self::DefaultThemeLoad { .. }
            | Self::Incomplete(_) => true,
        }
    }
}

/// Errors raised while assembling a [`Trellis`](crate::Trellis).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Two modules share a name
    #[error("Module '{0}' is registered twice")]
    DuplicateModule(String),

    /// A required collaborator was not supplied
    #[error("No {0} configured")]
    MissingCollaborator(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_init_errors_are_fatal() {
        let errors = [
            InitError::ConfigLoad(ConfigError::Io {
                path: "conf/trellis.json".into(),
                reason: "missing".into(),
            }),
            InitError::StorageConnect(StorageError::Connect {
                uri: "postgres://db".into(),
                reason: "refused".into(),
            }),
            InitError::DefaultThemeMissing {
                theme: "classic".into(),
            },
            InitError::DefaultThemeLoad {
                theme: "classic".into(),
                reason: "no layout".into(),
            },
            InitError::Incomplete(InitStep::ActivateTheme),
        ];
        assert!(errors.iter().all(InitError::is_fatal));
    }

    #[test]
    fn messages_name_the_theme() {
        let err = InitError::DefaultThemeMissing {
            theme: "classic".into(),
        };
        assert_eq!(err.to_string(), "Default theme 'classic' is not available");
        assert_eq!(
            BuildError::DuplicateModule("blog".into()).to_string(),
            "Module 'blog' is registered twice"
        );
    }
}
