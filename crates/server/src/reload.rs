//! Hot-reload controller.
//!
//! A single cooperative task polls the config source. When its modification
//! timestamp advances, the file is re-loaded and validated, command-line
//! overrides are reapplied, and a freshly built dispatcher is published
//! atomically. Any failure keeps the current plane; in-flight requests
//! holding the previous dispatcher complete against it.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use config::Config;
use gateway::SharedDispatcher;
use tokio_util::sync::CancellationToken;

pub async fn watch_config(
    shared: SharedDispatcher,
    path: PathBuf,
    mut last_modified: SystemTime,
    port_override: Option<u16>,
    poll_interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    log::info!("hot reload enabled for {}", path.display());

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                log::debug!("config watcher shutting down");
                return;
            }
            _ = ticker.tick() => {}
        }

        let modified = match tokio::fs::metadata(&path).await.and_then(|metadata| metadata.modified()) {
            Ok(modified) => modified,
            Err(error) => {
                log::warn!("config watcher stat failed for {}: {error}", path.display());
                continue;
            }
        };

        if modified <= last_modified {
            continue;
        }

        let mut config = match Config::load(&path) {
            Ok(config) => config,
            Err(error) => {
                log::warn!("config reload failed: {error:#}");
                continue;
            }
        };

        // The command-line port wins over file contents unconditionally.
        if let Some(port) = port_override {
            config.server.port = port;
        }

        let dispatcher = match gateway::build_dispatcher(&config) {
            Ok(dispatcher) => dispatcher,
            Err(error) => {
                log::warn!("provider rebuild failed: {error:#}");
                continue;
            }
        };

        shared.store(Arc::new(dispatcher));
        last_modified = modified;

        log::info!("configuration reloaded from {}", path.display());
    }
}
