//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::HelperConfig;
use crate::net::connection::ConnectionSettings;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HelperConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HelperConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading...");
                        reload(&path, &tx);
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and hand the result to the update consumer.
///
/// Returns whether a new configuration was delivered.
fn reload(path: &Path, tx: &mpsc::UnboundedSender<HelperConfig>) -> bool {
    match load_config(path) {
        Ok(new_config) => {
            if tx.send(new_config).is_err() {
                tracing::debug!(path = ?path, "Config update receiver gone, reload dropped");
                return false;
            }
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            false
        }
    }
}

/// Sections whose changes only take effect after a restart.
pub fn restart_required(current: &HelperConfig, next: &HelperConfig) -> Vec<&'static str> {
    let mut sections = Vec::new();
    if current.listener != next.listener {
        sections.push("listener");
    }
    if current.engine_settings() != next.engine_settings() {
        sections.push("transport");
    }
    if current.observability != next.observability {
        sections.push("observability");
    }
    sections
}

/// Apply reloaded configurations until the channel closes.
///
/// Connection settings are published immediately; new connections pick
/// them up on accept.
pub async fn apply_updates(
    mut current: HelperConfig,
    mut updates: mpsc::UnboundedReceiver<HelperConfig>,
    settings: Arc<ArcSwap<ConnectionSettings>>,
) {
    while let Some(next) = updates.recv().await {
        let connection = next.connection_settings();
        if **settings.load() != connection {
            tracing::info!(
                read_ms = next.timeouts.read_ms,
                write_ms = next.timeouts.write_ms,
                max_request_bytes = next.limits.max_request_bytes,
                "Connection settings reloaded"
            );
            settings.store(Arc::new(connection));
        }

        for section in restart_required(&current, &next) {
            tracing::warn!(section, "Configuration change requires a restart to take effect");
        }
        current = next;
    }
}
