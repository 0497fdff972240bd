//! Cooperative cancellation for in-flight requests.
//!
//! Cancellation never preempts a handler. The engine flips the handle when a
//! `notifications/cancelled` arrives; the handler may watch it and stop early,
//! and its eventual response is suppressed either way.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Clone-friendly: the engine and the handler hold copies of one handle.
#[derive(Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Signal cancellation. Idempotent; the first reason wins.
    pub fn cancel(&self, reason: Option<String>) {
        {
            let mut slot = self.reason.lock();
            if !*self.rx.borrow() && slot.is_none() {
                *slot = reason;
            }
        }
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Wait until cancellation is requested. Returns immediately if already cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Sender is held by every clone, so this only errors if all are gone
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
