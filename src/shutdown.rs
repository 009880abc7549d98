//! Process-wide, set-once shutdown signal

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;

/// Cloneable handle to one shared shutdown flag
///
/// Starts unset, is set at most once, and is never cleared.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Set the flag. Returns `true` only for the call that actually set it;
    /// later calls are no-ops and are not logged.
    pub fn trigger(&self, reason: &str) -> bool {
        let first = self.tx.send_if_modified(|set| {
            if *set {
                false
            } else {
                *set = true;
                true
            }
        });
        if first {
            log::info!("🛑 Shutdown requested: {}", reason);
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the flag is set. Cancel safe.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|set| *set).await;
    }

    /// Sleep for `duration` unless shutdown comes first.
    /// Returns `true` if the full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.wait() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
