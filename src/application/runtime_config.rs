use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub log_dir: PathBuf,
    pub interval: Duration,
}

impl From<Cli> for RuntimeConfig {
    fn from(cli: Cli) -> Self {
        Self {
            source_root: cli.original_path,
            destination_root: cli.synchronized_path,
            log_dir: cli.log_path,
            interval: Duration::from_secs(cli.synchronization_interval_seconds),
        }
    }
}
