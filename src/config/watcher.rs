//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event (modify/create) ──▶ raw channel
//!     → coalesce: absorb the burst until the file is quiet
//!     → load_config (parse + validate)
//!     → update channel ──▶ Reconciler::activate
//! ```
//!
//! Editors usually emit several events per save. Every reload rebuilds the
//! pools and restarts health monitors, so a burst yields exactly one load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time;

use crate::config::loader::load_config;
use crate::config::schema::LbConfig;

/// Quiet period after the last file event before the config is reloaded.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Monitors the configuration file and publishes each loaded revision.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<LbConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<LbConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching the file. Must be called inside a tokio runtime; the
    /// returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = raw_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");
        tokio::spawn(self.reload_loop(raw_rx));
        Ok(watcher)
    }

    async fn reload_loop(self, mut raw_rx: mpsc::UnboundedReceiver<()>) {
        while let Some(events) = coalesce(&mut raw_rx, self.debounce).await {
            tracing::info!(events, "Config file change detected, reloading");
            match load_config(&self.path) {
                Ok(config) => {
                    if self.update_tx.send(config).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current configuration"),
            }
        }
        tracing::debug!(path = ?self.path, "Config watcher stopped");
    }
}

/// Wait for the next event, then absorb further events until `quiet` passes
/// without one. Returns how many events were folded together, or `None`
/// once the sender is gone.
pub async fn coalesce(rx: &mut mpsc::UnboundedReceiver<()>, quiet: Duration) -> Option<usize> {
    rx.recv().await?;
    let mut events = 1;
    loop {
        match time::timeout(quiet, rx.recv()).await {
            Ok(Some(())) => events += 1,
            Ok(None) | Err(_) => return Some(events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_folds_into_one_reload() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        assert_eq!(coalesce(&mut rx, Duration::from_millis(20)).await, Some(5));

        // Nothing left over for a second reload.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn spaced_events_reload_separately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = tokio::spawn(async move {
            tx.send(()).unwrap();
            tx.send(()).unwrap();
            time::sleep(Duration::from_millis(200)).await;
            tx.send(()).unwrap();
        });

        assert_eq!(coalesce(&mut rx, Duration::from_millis(50)).await, Some(2));
        assert_eq!(coalesce(&mut rx, Duration::from_millis(50)).await, Some(1));
        sender.await.unwrap();
        assert_eq!(coalesce(&mut rx, Duration::from_millis(50)).await, None);
    }
}
