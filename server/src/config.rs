//! Process-level settings read from the environment.
//!
//! Site settings (database, themes, modules) live in the JSON config file;
//! only what is needed to find that file and bind sockets comes from here.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "conf/trellis.json";

/// Default log directives until the config file's `logging.level` applies.
pub const DEFAULT_LOG_DIRECTIVES: &str = "info,tower_http=debug,sqlx=warn";

/// Environment-derived server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// JSON config file (`TRELLIS_CONFIG`)
    pub config_path: PathBuf,
    /// Bind host (`HOST`)
    pub host: String,
    /// Bind port (`PORT`)
    pub port: u16,
    /// Prometheus exposition port (`METRICS_PORT`); disabled when unset
    pub metrics_port: Option<u16>,
}

impl ServerConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: var("TRELLIS_CONFIG")
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|s| s.parse().ok()).unwrap_or(8080),
            metrics_port: var("METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the metrics listener, if enabled.
    #[must_use]
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_port
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    }
}
