use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use colored::Colorize;
use snafu::prelude::*;
use tracing::debug;

use crate::filesystem::RelativePath;
use crate::reconciler::{ActionKind, ActionSet};

pub const LOG_FILE_NAME: &str = "sync_log.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Human-readable record of the actions taken by the latest pass.
///
/// The file only ever holds one pass: it is truncated when a pass is recorded
/// and every action is then appended as its own line. The same lines are
/// echoed to standard output.
#[derive(Debug, Clone)]
pub struct SyncLog {
    path: PathBuf,
    clock: fn() -> NaiveDateTime,
    echo: bool,
}

impl SyncLog {
    pub fn in_directory(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(LOG_FILE_NAME),
            clock: local_now,
            echo: true,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Keeps lines out of standard output.
    #[cfg(test)]
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn record_pass(&self, actions: &ActionSet) -> Result<(), SyncLogError> {
        debug!("Recording pass to {}", self.path.display());
        let mut file = File::create(&self.path).context(TruncateSnafu { path: &self.path })?;

        for (kind, relative_path) in actions.applied_actions() {
            let line = format_action_line(self.now(), kind, relative_path);
            writeln!(file, "{line}").context(AppendSnafu { path: &self.path })?;
            if self.echo {
                println!("{line}");
            }
        }

        Ok(())
    }

    /// Prints a console-only status line stamped with `at`.
    pub fn announce(&self, at: NaiveDateTime, message: &str) {
        if self.echo {
            println!("{} {}", format_timestamp(at), message.bold());
        }
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_action_line(at: NaiveDateTime, kind: ActionKind, path: &RelativePath) -> String {
    format!("{} {kind} file with file path {path}", format_timestamp(at))
}

#[derive(Debug, Snafu)]
pub enum SyncLogError {
    #[snafu(display("Failed to truncate the sync log at {}", path.display()))]
    TruncateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to append to the sync log at {}", path.display()))]
    AppendError {
        path: PathBuf,
        source: std::io::Error,
    },
}
