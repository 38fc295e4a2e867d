use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "One-way synchronization of a folder")]
pub struct Cli {
    /// The file path of the folder to be synchronized
    #[clap(long = "original_path", short = 'o', value_parser = existing_path)]
    pub original_path: PathBuf,

    /// The file path of the copied synced folder
    #[clap(long = "synchronized_path", short = 's', value_parser = existing_path)]
    pub synchronized_path: PathBuf,

    /// The file path of the log folder
    #[clap(long = "log_path", short = 'l', value_parser = existing_path)]
    pub log_path: PathBuf,

    /// The synchronization interval in seconds
    #[clap(long = "synchronization_interval_seconds", short = 'i')]
    pub synchronization_interval_seconds: u64,

    #[clap(long, default_value = "warn", value_enum)]
    pub log_level: LogLevel,
}

fn existing_path(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("{value} does not exist"))
    }
}
