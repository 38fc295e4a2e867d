use std::pin::pin;

use futures::future::{Either, select};
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::filesystem::{FilesystemService, LocalFilesystem};
use crate::reconciler::{ActionSet, ReconcileError, Reconciler};
use crate::scheduler::ShutdownSignal;
use crate::sync_log::{SyncLog, SyncLogError};

/// Drives synchronization passes for one source/destination pair.
pub struct Scheduler<F = LocalFilesystem> {
    config: RuntimeConfig,
    reconciler: Reconciler<F>,
    log: SyncLog,
}

impl<F: FilesystemService> Scheduler<F> {
    pub fn new(config: RuntimeConfig, reconciler: Reconciler<F>, log: SyncLog) -> Self {
        Self {
            config,
            reconciler,
            log,
        }
    }

    /// Runs a single pass and records its actions.
    pub async fn run_once(&self, shutdown: &ShutdownSignal) -> Result<ActionSet, SchedulerError> {
        let started_at = self.log.now();
        self.log.announce(
            started_at,
            &format!(
                "Started synchronization from {} to {} with a synchronization interval of {} seconds",
                self.config.source_root.display(),
                self.config.destination_root.display(),
                self.config.interval.as_secs()
            ),
        );

        let actions = self
            .reconciler
            .sync(
                &self.config.source_root,
                &self.config.destination_root,
                shutdown,
            )
            .await
            .context(PassSnafu)?;
        self.log.record_pass(&actions).context(RecordSnafu)?;

        self.log.announce(started_at, "Synchronization complete");
        Ok(actions)
    }

    /// Repeats passes separated by the configured interval until shutdown is
    /// requested. Any failing pass ends the loop with its error.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<(), SchedulerError> {
        let mut passes: u64 = 0;

        loop {
            match self.run_once(&shutdown).await {
                Ok(actions) => {
                    passes += 1;
                    debug!(
                        "Pass {} finished with {} created and {} removed entries",
                        passes,
                        actions.created().len(),
                        actions.removed().len()
                    );
                }
                Err(SchedulerError::PassError {
                    source: ReconcileError::Interrupted,
                }) => {
                    warn!("Shutdown requested mid-pass, destination may be partially synchronized");
                    return Ok(());
                }
                Err(error) => return Err(error),
            }

            if self.wait_for_next_pass(&shutdown).await {
                info!("Shutdown requested after {} passes", passes);
                return Ok(());
            }
        }
    }

    /// Sleeps for the interval. Returns `true` when shutdown won the race.
    async fn wait_for_next_pass(&self, shutdown: &ShutdownSignal) -> bool {
        if shutdown.is_requested() {
            return true;
        }

        debug!("Sleeping for {:?}", self.config.interval);
        let sleep = pin!(compio::time::sleep(self.config.interval));
        let stop = pin!(shutdown.wait());
        matches!(select(sleep, stop).await, Either::Right(_))
    }
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Synchronization pass failed"))]
    PassError { source: ReconcileError },
    #[snafu(display("Failed to record the synchronization pass"))]
    RecordError { source: SyncLogError },
}
