//! # Temp Upload Cleanup
//!
//! Background task that removes abandoned uploads.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client asks for upload URL ──► uploads/temp/products/…/x.png          │
//! │        │                                                                │
//! │        ├── entity saved  ──► moved to uploads/products/…/x.png          │
//! │        └── never saved   ──► swept once older than TEMP_MAX_AGE_SECS    │
//! │                                                                         │
//! │  • Sweep interval: CLEANUP_INTERVAL_SECS (default 1 hour)               │
//! │  • Failures are logged and retried on the next tick                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::storage::{FileStorage, StorageError, TEMP_FOLDER};

/// Periodic sweep of the temp upload area.
pub struct TempCleanup {
    storage: Arc<dyn FileStorage>,
    max_age: Duration,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle used to stop the cleanup task.
#[derive(Clone)]
pub struct TempCleanupHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl TempCleanupHandle {
    /// Asks the task to stop after the current sweep.
    pub async fn shutdown(&self) {
        // A closed channel means the task already stopped
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl TempCleanup {
    /// Creates the task and its handle.
    pub fn new(
        storage: Arc<dyn FileStorage>,
        max_age: Duration,
        interval: Duration,
    ) -> (Self, TempCleanupHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let cleanup = TempCleanup {
            storage,
            max_age,
            interval,
            shutdown_rx,
        };
        (cleanup, TempCleanupHandle { shutdown_tx })
    }

    /// Runs the sweep loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Temp upload cleanup starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Temp upload cleanup failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Temp upload cleanup shutting down");
                    break;
                }
            }
        }

        info!("Temp upload cleanup stopped");
    }

    /// Deletes expired temp uploads once. Returns how many were removed.
    pub async fn sweep(&self) -> Result<usize, StorageError> {
        let deleted = self
            .storage
            .cleanup_expired(TEMP_FOLDER, self.max_age)
            .await?;

        if deleted > 0 {
            info!(deleted, "Expired temp uploads removed");
        } else {
            debug!("No expired temp uploads");
        }
        Ok(deleted)
    }
}
