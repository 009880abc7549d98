//! Task supervision and cooperative shutdown
//!
//! Runs the consumer and the console as two independent tasks that share one
//! [`ShutdownSignal`]. Whatever sets the signal first (OS signal, `quit`,
//! end of console input, or a task dying) starts the same single shutdown
//! sequence.

use crate::{
    config::AppConfig,
    consumer::run_consumer,
    control::{spawn_stdin_reader, ConsoleReceiver, ControlLoop},
    shutdown::ShutdownSignal,
    state::AggregateStore,
};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::AsyncWrite,
    task::{JoinError, JoinHandle},
};

/// How long each task may take to wind down before it is aborted
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one supervised run
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Tasks that panicked, as `name: error`
    pub failures: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Supervisor {
    config: AppConfig,
    store: Arc<AggregateStore>,
    shutdown: ShutdownSignal,
    grace: Duration,
}

impl Supervisor {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(AggregateStore::new(config.window_size));
        Self {
            config,
            store,
            shutdown: ShutdownSignal::new(),
            grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn store(&self) -> Arc<AggregateStore> {
        self.store.clone()
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Run against process stdin/stdout
    pub async fn run(self) -> ShutdownReport {
        let input = if self.config.control.enabled {
            spawn_stdin_reader()
        } else {
            log::info!("CLI disabled by configuration");
            None
        };
        self.run_with_console(input, tokio::io::stdout()).await
    }

    /// Run with an explicit console source and sink
    pub async fn run_with_console<W>(self, input: Option<ConsoleReceiver>, out: W) -> ShutdownReport
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let signals = spawn_signal_listener(self.shutdown.clone());

        let mut consumer = tokio::spawn(run_consumer(
            self.config.broker.clone(),
            self.config.reconnect_delay,
            self.store.clone(),
            self.shutdown.clone(),
        ));

        let mut console = {
            let mut control = ControlLoop::new(
                self.store.clone(),
                self.shutdown.clone(),
                self.config.control.clone(),
                out,
            );
            tokio::spawn(async move { control.run(input).await })
        };

        // Block until shutdown, or until a task ends on its own
        let mut consumer_result = None;
        let mut console_result = None;
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => {}
            result = &mut consumer => consumer_result = Some(result),
            result = &mut console => console_result = Some(result),
        }

        if !self.shutdown.is_triggered() {
            let name = if consumer_result.is_some() { "consumer" } else { "console" };
            log::error!("❌ Task {} exited unexpectedly", name);
            self.shutdown.trigger("task exited");
        }

        log::info!("Shutdown signal received. Cancelling running tasks...");

        let mut report = ShutdownReport::default();
        for (name, handle, finished) in [
            ("consumer", consumer, consumer_result),
            ("console", console, console_result),
        ] {
            let result = match finished {
                Some(result) => result,
                None => self.join_with_grace(name, handle).await,
            };
            if let Some(failure) = task_failure(name, result) {
                report.failures.push(failure);
            }
        }

        signals.abort();
        log::info!("Sensor Analyzer Service stopped.");
        report
    }

    async fn join_with_grace(&self, name: &str, mut handle: JoinHandle<()>) -> Result<(), JoinError> {
        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Task {} did not stop within {:?}, aborting", name, self.grace);
                handle.abort();
                handle.await
            }
        }
    }
}

/// Cancellation is the expected way out and is not a failure
fn task_failure(name: &str, result: Result<(), JoinError>) -> Option<String> {
    match result {
        Ok(()) => None,
        Err(e) if e.is_cancelled() => None,
        Err(e) => {
            log::error!("Task {} raised an exception: {}", name, e);
            Some(format!("{}: {}", name, e))
        }
    }
}

/// Turn SIGINT/SIGTERM into the shared shutdown signal
///
/// Keeps listening after the first signal so repeats are absorbed instead of
/// restarting the shutdown sequence.
fn spawn_signal_listener(shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match wait_for_termination().await {
                Ok(name) => {
                    log::info!("Received signal {}. Initiating shutdown...", name);
                    if !shutdown.trigger(name) {
                        log::debug!("{} received while already shutting down", name);
                    }
                }
                Err(e) => {
                    log::warn!("Signal handlers not supported on this platform: {}", e);
                    return;
                }
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "SIGINT")
}
