//! Cooperative cancellation for refresh cycles.
//!
//! A [`ShutdownTrigger`] broadcasts through a watch channel; every task holds a
//! cheap [`CancellationSignal`] clone and checks it at its natural checkpoints
//! (batch boundaries, before committing to the cache).

use tokio::sync::watch;

use crate::errors::{CloudInfoError, Result};

/// Sending half: requests cancellation of every linked signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// A new signal linked to this trigger.
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half, cloned into every task.
#[derive(Clone, Debug)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CloudInfoError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when cancellation is requested; never resolves for a signal
    /// whose trigger was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, CancellationSignal { rx })
}
