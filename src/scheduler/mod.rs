//! Repeats synchronization passes on an interval until asked to stop.

mod scheduler;
pub mod shutdown;

pub use scheduler::{Scheduler, SchedulerError};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
