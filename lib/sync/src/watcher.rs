//! Configuration watcher.
//!
//! The watch stream is drained by a producer task that forwards matching
//! resources onto a bounded queue. A single consumer resolves and applies
//! them in arrival order, so two updates are never resolved concurrently.

use arc_swap::ArcSwapOption;
use backbone_store::{Resource, ResourceKind, ResourceStore, WatchEvent, WatchStream};
use futures::StreamExt;
use rootcause::Report;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::{self, BrokerConfig, Mode};
use crate::error::ConfigError;
use crate::readiness::ReadinessBarrier;
use crate::resources::ConfigSpec;
use crate::secret::SecretResolver;

/// Capacity of the queue between the watch producer and the consumer.
pub const CONFIG_QUEUE_CAPACITY: usize = 16;

/// The currently applied configuration, readable without locking.
#[derive(Debug, Default)]
pub struct LiveConfig {
    current: ArcSwapOption<BrokerConfig>,
}

impl LiveConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the applied configuration, or `None` before the first apply.
    #[must_use]
    pub fn load(&self) -> Option<Arc<BrokerConfig>> {
        self.current.load_full()
    }

    /// Replaces the applied configuration.
    pub fn publish(&self, config: Arc<BrokerConfig>) {
        self.current.store(Some(config));
    }

    /// The sync interval of the applied configuration, if it sets one.
    #[must_use]
    pub fn sync_interval(&self) -> Option<Duration> {
        self.current
            .load()
            .as_ref()
            .and_then(|config| config.sync_interval())
    }
}

/// Applies updates of one named configuration resource.
pub struct ConfigWatcher {
    store: Arc<dyn ResourceStore>,
    secrets: SecretResolver,
    live: Arc<LiveConfig>,
    readiness: ReadinessBarrier,
    config_name: String,
    mode: Mode,
}

impl ConfigWatcher {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        secrets: SecretResolver,
        live: Arc<LiveConfig>,
        readiness: ReadinessBarrier,
        config_name: impl Into<String>,
        mode: Mode,
    ) -> Self {
        Self {
            store,
            secrets,
            live,
            readiness,
            config_name: config_name.into(),
            mode,
        }
    }

    #[must_use]
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Resolves a configuration resource and, if every reference resolves,
    /// makes it the live configuration.
    ///
    /// On error the previous configuration stays in place.
    pub async fn apply(&self, resource: &Resource) -> Result<Arc<BrokerConfig>, Report<ConfigError>> {
        let spec: ConfigSpec = resource.spec().map_err(|report| ConfigError::Decode {
            reason: report.current_context().to_string(),
        })?;

        let resolved = Arc::new(config::resolve(spec, &self.secrets, self.mode).await?);
        self.live.publish(Arc::clone(&resolved));

        if self.readiness.release() {
            info!(
                name = resource.name(),
                mode = %resolved.mode(),
                "initial configuration applied"
            );
        } else {
            debug!(name = resource.name(), "configuration hot-swapped");
        }
        Ok(resolved)
    }

    /// Watches the configuration resource until `shutdown` fires or the
    /// watch ends.
    ///
    /// If the watch cannot be established the failure is logged and the
    /// watcher returns without retrying.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let events = match self.store.watch(ResourceKind::Config).await {
            Ok(events) => events,
            Err(report) => {
                error!(error = %report, name = %self.config_name, "cannot watch configuration");
                return;
            }
        };

        let (tx, mut rx) = mpsc::channel(CONFIG_QUEUE_CAPACITY);
        let producer = tokio::spawn(forward_updates(events, self.config_name.clone(), tx));
        info!(name = %self.config_name, "watching configuration");

        loop {
            tokio::select! {
                update = rx.recv() => match update {
                    Some(resource) => {
                        if let Err(report) = self.apply(&resource).await {
                            warn!(
                                error = %report,
                                name = %self.config_name,
                                "configuration update rejected, keeping previous"
                            );
                        }
                    }
                    None => {
                        warn!(name = %self.config_name, "configuration watch ended");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    debug!("configuration watcher stopping");
                    break;
                }
            }
        }

        producer.abort();
    }
}

/// Pushes applied versions of the named resource onto the queue.
async fn forward_updates(mut events: WatchStream, name: String, tx: mpsc::Sender<Resource>) {
    while let Some(event) = events.next().await {
        match event {
            Ok(WatchEvent::Applied(resource)) if resource.name() == name => {
                if tx.send(resource).await.is_err() {
                    // Consumer is gone.
                    return;
                }
            }
            Ok(WatchEvent::Applied(resource)) => {
                debug!(name = resource.name(), "ignoring unrelated configuration");
            }
            Ok(WatchEvent::Deleted(resource)) if resource.name() == name => {
                warn!(%name, "configuration deleted, keeping last applied");
            }
            Ok(WatchEvent::Deleted(_)) => {}
            Err(report) => warn!(error = %report, "configuration watch error"),
        }
    }
}
