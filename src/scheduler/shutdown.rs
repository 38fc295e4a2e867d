use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{self, FutureExt, Shared};
use futures_channel::oneshot;

/// Creates a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let requested = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = oneshot::channel();

    let trigger = ShutdownTrigger {
        requested: requested.clone(),
        sender,
    };
    let signal = ShutdownSignal {
        requested,
        notified: Some(receiver.shared()),
    };
    (trigger, signal)
}

pub struct ShutdownTrigger {
    requested: Arc<AtomicBool>,
    sender: oneshot::Sender<()>,
}

impl ShutdownTrigger {
    pub fn trigger(self) {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }
}

/// Observes a shutdown request. Dropping the trigger without firing it does
/// not count as a request.
#[derive(Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    notified: Option<Shared<oneshot::Receiver<()>>>,
}

impl ShutdownSignal {
    #[cfg(test)]
    pub fn never() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            notified: None,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown is requested.
    pub async fn wait(&self) {
        if let Some(notified) = &self.notified {
            if notified.clone().await.is_ok() {
                return;
            }
        }
        future::pending::<()>().await
    }
}
