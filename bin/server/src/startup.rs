//! Process startup: first configuration, first sync, then serving state.

use backbone_store::ResourceStore;
use backbone_sync::{
    ConfigWatcher, LiveConfig, ReadinessBarrier, ResourceSyncEngine, SecretResolver,
};
use rootcause::Report;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::AppState;
use crate::config::ServerConfig;

/// Why startup ended before the server could serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The configuration watcher exited before any configuration applied,
    /// typically because the store is unreachable.
    WatcherStopped,
    /// Shutdown was requested while waiting for the first configuration.
    Interrupted,
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WatcherStopped => {
                write!(f, "configuration watcher stopped before a configuration applied")
            }
            Self::Interrupted => write!(f, "shutdown requested during startup"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Everything `main` needs once startup has completed.
pub struct Services {
    pub state: Arc<AppState>,
    pub watcher: JoinHandle<()>,
    pub sync: JoinHandle<()>,
}

/// Starts the configuration watcher, waits for the first configuration to
/// apply, runs the first sync and starts the sync loop.
///
/// Returns only once the snapshot is populated, so the router built from
/// [`Services::state`] never serves an empty snapshot.
///
/// # Errors
///
/// [`StartupError::WatcherStopped`] when the watcher exits first and
/// [`StartupError::Interrupted`] when `shutdown` fires first.
pub async fn start(
    config: &ServerConfig,
    store: Arc<dyn ResourceStore>,
    shutdown: watch::Receiver<bool>,
) -> Result<Services, Report<StartupError>> {
    let live = Arc::new(LiveConfig::new());
    let readiness = ReadinessBarrier::new();
    let engine = Arc::new(ResourceSyncEngine::new(
        Arc::clone(&store),
        config.store_timeout(),
    ));

    let watcher = ConfigWatcher::new(
        Arc::clone(&store),
        SecretResolver::new(Arc::clone(&store), config.store_timeout()),
        Arc::clone(&live),
        readiness.clone(),
        config.config_name.clone(),
        config.mode,
    );
    let mut watcher_task = tokio::spawn(watcher.run(shutdown.clone()));

    tracing::info!(name = %config.config_name, "Waiting for broker configuration");
    let mut stop = shutdown.clone();
    tokio::select! {
        biased;
        () = readiness.wait() => {}
        _ = stop.wait_for(|stop| *stop) => {
            watcher_task.abort();
            return Err(StartupError::Interrupted.into());
        }
        _ = &mut watcher_task => return Err(StartupError::WatcherStopped.into()),
    }

    engine.sync().await;
    let sync = tokio::spawn({
        let engine = Arc::clone(&engine);
        let live = Arc::clone(&live);
        let default_interval = config.sync_interval();
        async move { engine.run(live, default_interval, shutdown).await }
    });

    let state = AppState::new(
        config.mode,
        engine,
        live,
        config.public_url(),
        config.secure_cookies,
    )
    .with_provider_timeout(config.provider_timeout());

    Ok(Services {
        state: Arc::new(state),
        watcher: watcher_task,
        sync,
    })
}
