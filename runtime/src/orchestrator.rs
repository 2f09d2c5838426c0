//! The initialization pipeline.
//!
//! One driver runs [`InitStep::SEQUENCE`] in order. Each step either succeeds
//! or returns a fatal [`InitError`]; recoverable conditions (front theme
//! fallback, module init failures) are handled inside the owning component.
//!
//! ```text
//! LoadConfig → StageEvents → ConfigureLogging → ConnectStorage
//!     → DiscoverThemes → ActivateTheme → DiscoverModules → InitModules
//!     → commit (publish snapshot, remount assets, adopt event bus,
//!               Initialised, completion)
//! ```
//!
//! Cycles are single-flight: a cycle holds the gate for its whole duration,
//! and concurrent calls queue behind it. Nothing is published until every
//! step has succeeded, so a failed cycle leaves the previous state serving,
//! its listeners included. Steps publish their events on a staged bus that
//! only goes live at commit.
//!
//! At commit the snapshot is published first and the asset slots are
//! remounted right after it, with nothing awaited in between.

use crate::app::{Snapshot, Trellis};
use crate::error::InitError;
use crate::metrics::InitMetrics;
use crate::modules::ModuleTable;
use crate::themes::{ThemeCatalog, activate_theme, discover_themes, mount_assets};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::Instrument;
use trellis_core::storage::redact_uri;
use trellis_core::{
    ConnectOptions, EventBus, LoadedTheme, Settings, StorageHandle, SystemEvent,
};

/// One stage of the initialization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    /// Re-read the configuration store when forced, then extract settings
    LoadConfig,
    /// Stage a fresh event bus for this cycle's listeners
    StageEvents,
    /// Apply `logging.level`
    ConfigureLogging,
    /// Connect the storage backend
    ConnectStorage,
    /// Scan the theme base path
    DiscoverThemes,
    /// Load the front theme, falling back to the default
    ActivateTheme,
    /// Build the module table
    DiscoverModules,
    /// Run module init hooks
    InitModules,
}

impl InitStep {
    /// Pipeline order.
    pub const SEQUENCE: [Self; 8] = [
        Self::LoadConfig,
        Self::StageEvents,
        Self::ConfigureLogging,
        Self::ConnectStorage,
        Self::DiscoverThemes,
        Self::ActivateTheme,
        Self::DiscoverModules,
        Self::InitModules,
    ];

    /// Step name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadConfig => "load_config",
            Self::StageEvents => "stage_events",
            Self::ConfigureLogging => "configure_logging",
            Self::ConnectStorage => "connect_storage",
            Self::DiscoverThemes => "discover_themes",
            Self::ActivateTheme => "activate_theme",
            Self::DiscoverModules => "discover_modules",
            Self::InitModules => "init_modules",
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a completed initialization cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Generation of the published state
    pub generation: u64,
    /// Name of the active theme
    pub active_theme: String,
    /// Discovered theme names
    pub available_themes: Vec<String>,
    /// Modules taking part in routing, in order
    pub initialised_modules: Vec<String>,
    /// Modules whose init hook failed, with the reason
    pub failed_modules: Vec<(String, String)>,
    /// Wall time of the cycle
    pub duration: Duration,
}

impl InitReport {
    fn new(snapshot: &Snapshot, duration: Duration) -> Self {
        Self {
            generation: snapshot.generation,
            active_theme: snapshot.active_theme.name().to_string(),
            available_themes: snapshot.themes.names(),
            initialised_modules: snapshot.modules.initialised(),
            failed_modules: snapshot.modules.failed(),
            duration,
        }
    }
}

/// Called once when a cycle completes successfully. Never called on failure.
pub type Completion = Box<dyn FnOnce(&InitReport) + Send>;

#[derive(Default)]
struct Staging {
    settings: Option<Arc<Settings>>,
    events: Option<Arc<EventBus>>,
    storage: Option<Arc<dyn StorageHandle>>,
    themes: ThemeCatalog,
    theme: Option<Arc<LoadedTheme>>,
    modules: ModuleTable,
}

impl Staging {
    fn settings(&self) -> Result<Arc<Settings>, InitError> {
        self.settings
            .clone()
            .ok_or(InitError::Incomplete(InitStep::LoadConfig))
    }

    fn events(&self) -> Result<Arc<EventBus>, InitError> {
        self.events
            .clone()
            .ok_or(InitError::Incomplete(InitStep::StageEvents))
    }

    fn storage(&self) -> Result<Arc<dyn StorageHandle>, InitError> {
        self.storage
            .clone()
            .ok_or(InitError::Incomplete(InitStep::ConnectStorage))
    }

    fn finish(self, generation: u64) -> Result<Snapshot, InitError> {
        Ok(Snapshot {
            generation,
            settings: self.settings()?,
            storage: self.storage()?,
            active_theme: self
                .theme
                .ok_or(InitError::Incomplete(InitStep::ActivateTheme))?,
            themes: self.themes,
            modules: self.modules,
        })
    }
}

impl Trellis {
    /// Run a full initialization cycle.
    ///
    /// With `force_config_reload` the configuration store is re-read from its
    /// source first; otherwise the in-memory configuration is used.
    ///
    /// # Errors
    ///
    /// Returns the fatal [`InitError`] that stopped the cycle, after the
    /// configured [`Terminator`](crate::Terminator) has been invoked.
    pub async fn initialise(&self, force_config_reload: bool) -> Result<InitReport, InitError> {
        self.initialise_with(force_config_reload, None).await
    }

    /// [`Trellis::initialise`] with a completion callback, invoked exactly
    /// once on success.
    ///
    /// # Errors
    ///
    /// See [`Trellis::initialise`].
    pub async fn initialise_with(
        &self,
        force_config_reload: bool,
        on_complete: Option<Completion>,
    ) -> Result<InitReport, InitError> {
        if self.is_initialising() {
            tracing::info!("Initialization already running, queueing");
        }
        let _gate = self.gate.lock().await;
        let started = Instant::now();
        tracing::info!(force_config_reload, "Initialization started");

        let mut staging = Staging::default();
        for step in InitStep::SEQUENCE {
            let span = tracing::info_span!("init_step", step = %step);
            if let Err(error) = self
                .run_step(step, force_config_reload, &mut staging)
                .instrument(span)
                .await
            {
                return Err(self.fail(step, error));
            }
        }

        let generation = self.generation.load(Ordering::Acquire) + 1;
        let staged_events = match staging.events() {
            Ok(events) => events,
            Err(error) => return Err(self.fail(InitStep::StageEvents, error)),
        };
        let snapshot = match staging.finish(generation) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(error) => return Err(self.fail(InitStep::InitModules, error)),
        };

        self.publish(Arc::clone(&snapshot));
        mount_assets(
            &self.asset_mounts,
            &snapshot.active_theme,
            snapshot.settings.cache_ttl,
        );
        self.events.adopt(&staged_events);
        self.generation.store(generation, Ordering::Release);

        let report = InitReport::new(&snapshot, started.elapsed());
        InitMetrics::record_success(report.duration);
        self.events.publish(SystemEvent::Initialised { generation });
        tracing::info!(
            generation,
            theme = %report.active_theme,
            modules = ?report.initialised_modules,
            failed = report.failed_modules.len(),
            elapsed_ms = report.duration.as_millis(),
            "Initialization complete"
        );

        if let Some(done) = on_complete {
            done(&report);
        }
        Ok(report)
    }

    /// Re-read the configuration and re-run the full pipeline.
    ///
    /// This is the entry point for external reload signals. `on_complete` is
    /// invoked once, after the reloaded state is published.
    ///
    /// # Errors
    ///
    /// See [`Trellis::initialise`].
    pub async fn reload_config(
        &self,
        on_complete: Option<Completion>,
    ) -> Result<InitReport, InitError> {
        tracing::info!("Configuration reload requested");
        let forward: Completion = Box::new(move |report: &InitReport| {
            tracing::info!(generation = report.generation, "Configuration reload complete");
            if let Some(done) = on_complete {
                done(report);
            }
        });
        self.initialise_with(true, Some(forward)).await
    }

    /// Whether a cycle is currently running.
    #[must_use]
    pub fn is_initialising(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    fn fail(&self, step: InitStep, error: InitError) -> InitError {
        tracing::error!(
            step = %step,
            error = %error,
            fatal = error.is_fatal(),
            "Initialization failed"
        );
        InitMetrics::record_fatal();
        self.terminator.terminate(&error);
        error
    }

    async fn run_step(
        &self,
        step: InitStep,
        force_config_reload: bool,
        staging: &mut Staging,
    ) -> Result<(), InitError> {
        match step {
            InitStep::LoadConfig => {
                if force_config_reload {
                    self.config.load().await?;
                    self.events.publish(SystemEvent::ConfigReloaded);
                    tracing::info!("Configuration reloaded");
                }
                staging.settings = Some(Arc::new(Settings::from_store(self.config.as_ref())));
            },
            InitStep::StageEvents => {
                staging.events = Some(Arc::new(self.events.staged()));
            },
            InitStep::ConfigureLogging => {
                let settings = staging.settings()?;
                match &self.log_control {
                    Some(control) => match control.apply(&settings.logging_level) {
                        Ok(()) => {
                            tracing::debug!(
                                directives = %settings.logging_level,
                                "Log filter applied"
                            );
                        },
                        Err(e) => {
                            tracing::warn!(error = %e, "Keeping previous log filter");
                        },
                    },
                    None => tracing::debug!("No log control installed"),
                }
            },
            InitStep::ConnectStorage => {
                let settings = staging.settings()?;
                let uri = &settings.database.uri;
                let options = ConnectOptions::from(&settings.database);
                let storage = self
                    .storage_driver
                    .connect(uri, &options)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(
                            uri = %redact_uri(uri),
                            error = %e,
                            "Storage connection failed"
                        );
                    })?;
                tracing::info!(
                    backend = %storage.backend(),
                    uri = %redact_uri(uri),
                    "Storage connected"
                );
                staging.events()?.publish(SystemEvent::StorageConnected {
                    backend: storage.backend().to_string(),
                });
                staging.storage = Some(storage);
            },
            InitStep::DiscoverThemes => {
                let settings = staging.settings()?;
                staging.themes = discover_themes(&settings.themes.path).await;
                staging.events()?.publish(SystemEvent::ThemesDiscovered {
                    count: staging.themes.len(),
                });
            },
            InitStep::ActivateTheme => {
                let settings = staging.settings()?;
                let events = staging.events()?;
                let theme = activate_theme(
                    &staging.themes,
                    self.theme_loader.as_ref(),
                    &events,
                    &settings.themes,
                    None,
                )
                .await?;
                staging.theme = Some(theme);
            },
            InitStep::DiscoverModules => {
                let settings = staging.settings()?;
                staging.modules = self.modules.load_modules(&settings).await;
            },
            InitStep::InitModules => {
                let settings = staging.settings()?;
                let storage = staging.storage()?;
                let events = staging.events()?;
                staging
                    .modules
                    .init_modules(&settings, &storage, &events)
                    .await;
            },
        }
        Ok(())
    }
}
