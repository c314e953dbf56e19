//! One-shot readiness barrier.

use std::sync::Arc;
use tokio::sync::watch;

/// Released once, when the first valid configuration has been applied.
///
/// Waiters that arrive after the release return immediately. Releasing again
/// is a no-op.
#[derive(Debug, Clone)]
pub struct ReadinessBarrier {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ReadinessBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessBarrier {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Releases the barrier. Returns `true` only for the call that released it.
    pub fn release(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Waits until the barrier is released.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
