use crate::shutdown::ShutdownSignal;
use std::time::Duration;

/// Fixed-delay reconnect backoff that never gives up
///
/// Each wait is interruptible by shutdown so a pending retry never holds up
/// process exit.
#[derive(Debug)]
pub struct ReconnectBackoff {
    delay: Duration,
    current_attempt: u32,
}

impl ReconnectBackoff {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current_attempt: 0,
        }
    }

    /// Wait out the delay. Returns `false` if shutdown interrupted it.
    pub async fn sleep(&mut self, shutdown: &ShutdownSignal) -> bool {
        if shutdown.is_triggered() {
            return false;
        }

        self.current_attempt += 1;
        log::warn!(
            "⏳ Retry attempt {} in {}s",
            self.current_attempt,
            self.delay.as_secs_f64()
        );

        shutdown.sleep(self.delay).await
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}
