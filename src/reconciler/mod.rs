mod action_set;
mod reconciler;

pub use action_set::{ActionKind, ActionSet};
pub use reconciler::{ReconcileError, Reconciler};
