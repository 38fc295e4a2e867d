mod sync_log;

pub use sync_log::{SyncLog, SyncLogError};
