//! Scheduled Jobs
//!
//! Periodic projection maintenance. An external scheduler could equally
//! drive the fleet's trigger methods; this module is the built-in timer
//! that does so.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::projection::ProjectionSynchronizer;

/// Configuration for the sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Interval for the missing-row scan (default: 30 seconds)
    pub differences_interval: Duration,
    /// Interval for the full rebuild (default: 1 hour)
    pub full_resync_interval: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            differences_interval: Duration::from_secs(30),
            full_resync_interval: Duration::from_secs(3600),
        }
    }
}

/// Report of one manual maintenance pass
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub rows_created: usize,
    pub rows_rebuilt: usize,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Sync Scheduler - periodically reconciles projections with the log
pub struct SyncScheduler {
    synchronizer: Arc<ProjectionSynchronizer>,
    config: SyncSchedulerConfig,
}

impl SyncScheduler {
    /// Create a scheduler with default intervals
    pub fn new(synchronizer: Arc<ProjectionSynchronizer>) -> Self {
        Self {
            synchronizer,
            config: SyncSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(
        synchronizer: Arc<ProjectionSynchronizer>,
        config: SyncSchedulerConfig,
    ) -> Self {
        Self {
            synchronizer,
            config,
        }
    }

    /// Start the scheduler in the background.
    /// Returns a handle that can be used to abort the scheduler.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("Sync scheduler started");

        let mut differences_interval = interval(self.config.differences_interval);
        let mut resync_interval = interval(self.config.full_resync_interval);
        // The first tick of each interval fires immediately; that initial
        // pass doubles as startup catch-up.

        loop {
            tokio::select! {
                _ = differences_interval.tick() => {
                    let created = self.synchronizer.sync_differences().await;
                    if created > 0 {
                        tracing::info!(created, "Created missing projection rows");
                    }
                }
                _ = resync_interval.tick() => {
                    let rebuilt = self.synchronizer.sync_all().await;
                    tracing::info!(rebuilt, "Full projection resync completed");
                }
            }
        }
    }

    /// Run both passes once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> SyncReport {
        let rows_created = self.synchronizer.sync_differences().await;
        let rows_rebuilt = self.synchronizer.sync_all().await;
        SyncReport {
            rows_created,
            rows_rebuilt,
            completed_at: Some(Utc::now()),
        }
    }
}
