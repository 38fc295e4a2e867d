use compio::runtime::spawn;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use crate::application::RuntimeConfig;
use crate::filesystem::LocalFilesystem;
use crate::reconciler::Reconciler;
use crate::scheduler::{Scheduler, SchedulerError, ShutdownTrigger, shutdown};
use crate::sync_log::SyncLog;

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        debug!("Runtime config: {:?}", app_config);

        let (trigger, shutdown) = shutdown::channel();
        listen_for_interrupt(trigger);

        let log = SyncLog::in_directory(&app_config.log_dir);
        let scheduler = Scheduler::new(app_config, Reconciler::new(LocalFilesystem), log);
        scheduler.run(shutdown).await.context(SchedulingSnafu)?;

        info!("Synchronization stopped");
        Ok(())
    }
}

/// Fires the trigger on Ctrl-C so the scheduler stops at its next checkpoint.
fn listen_for_interrupt(trigger: ShutdownTrigger) {
    spawn(async move {
        match compio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping before the next file operation");
                trigger.trigger();
            }
            Err(error) => warn!("Failed to listen for interrupts: {}", error),
        }
    })
    .detach();
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during synchronization"))]
    SchedulingError { source: SchedulerError },
}
