//! Operator console: line commands against the live aggregation state
//!
//! Best effort: failures in one command are logged and the loop
//! keeps going; nothing here can take ingestion down.

pub mod command;
pub mod export;
pub mod input;
pub mod render;

pub use command::Command;
pub use export::{export_snapshot, load_export, ExportDocument, ExportError, ExportedCategory};
pub use input::{spawn_stdin_reader, ConsoleInput, ConsoleReceiver};

use crate::{config::ControlConfig, shutdown::ShutdownSignal, state::AggregateStore};
use futures_util::FutureExt;
use std::{
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};

const ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("console output failed: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ControlLoop<W> {
    store: Arc<AggregateStore>,
    shutdown: ShutdownSignal,
    config: ControlConfig,
    out: W,
}

impl<W> ControlLoop<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        store: Arc<AggregateStore>,
        shutdown: ShutdownSignal,
        config: ControlConfig,
        out: W,
    ) -> Self {
        Self {
            store,
            shutdown,
            config,
            out,
        }
    }

    /// Run until quit, end-of-input, or shutdown
    ///
    /// Without an input source the loop is inert and only waits for shutdown.
    pub async fn run(&mut self, input: Option<ConsoleReceiver>) {
        let Some(mut rx) = input else {
            log::warn!("Interactive console input unavailable. CLI commands disabled.");
            self.shutdown.wait().await;
            return;
        };

        log::info!("CLI handler started. Type 'help' for commands.");
        let mut show_prompt = true;

        while !self.shutdown.is_triggered() {
            if show_prompt {
                if let Err(e) = self.write(render::PROMPT).await {
                    log::debug!("Prompt write failed: {}", e);
                }
                show_prompt = false;
            }

            let polled = tokio::select! {
                biased;
                _ = self.shutdown.wait() => break,
                polled = tokio::time::timeout(self.config.poll_interval, rx.recv()) => polled,
            };

            let line = match polled {
                // Poll interval elapsed with no input; re-check shutdown
                Err(_) => continue,
                Ok(None) => {
                    log::info!("EOF detected on console input. Shutting down.");
                    self.shutdown.trigger("end of console input");
                    break;
                }
                Ok(Some(ConsoleInput::Line(line))) => line,
                Ok(Some(ConsoleInput::Unavailable(e))) => {
                    log::warn!("Console input failed: {}. CLI commands unavailable.", e);
                    self.shutdown.wait().await;
                    break;
                }
            };
            show_prompt = true;

            let outcome = AssertUnwindSafe(self.execute(Command::parse(&line)))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(Flow::Continue)) => {}
                Ok(Ok(Flow::Quit)) => {
                    self.shutdown.trigger("quit command");
                    break;
                }
                Ok(Err(e)) => {
                    log::error!("Error in CLI handler: {}", e);
                    self.shutdown.sleep(ERROR_PAUSE).await;
                }
                Err(_) => {
                    log::error!("CLI handler panicked while running '{}'", line.trim());
                    self.shutdown.sleep(ERROR_PAUSE).await;
                }
            }
        }

        log::info!("CLI handler finished.");
    }

    async fn execute(&mut self, command: Command) -> Result<Flow, ControlError> {
        match command {
            Command::Filter(None) => {
                self.store.set_filter(None);
                log::info!("Log filter cleared. Showing all sensor types.");
            }
            Command::Filter(Some(sensor_type)) => {
                log::info!("Log filter set to: {}", sensor_type);
                self.store.set_filter(Some(sensor_type));
            }
            Command::Stats => {
                let text = render::render_stats(&self.store.snapshot());
                self.write(&text).await?;
            }
            Command::Export(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(&self.config.default_export_path));
                self.export(path).await?;
            }
            Command::Help => self.write(render::HELP_TEXT).await?,
            Command::Quit => {
                log::info!("Quit command received. Initiating shutdown.");
                return Ok(Flow::Quit);
            }
            Command::Empty => {}
            Command::Unknown(keyword) => {
                log::warn!("Unknown command: '{}'. Type 'help'.", keyword);
            }
        }
        Ok(Flow::Continue)
    }

    /// Export failures are reported, never propagated
    async fn export(&mut self, path: PathBuf) -> Result<(), ControlError> {
        log::info!("Exporting statistics to '{}'...", path.display());
        let snapshot = self.store.snapshot();

        match export_snapshot(&snapshot, &path).await {
            Ok(categories) => {
                log::info!("Successfully exported stats to '{}'", path.display());
                self.write(&format!(
                    "Exported {} sensor types to {}\n",
                    categories,
                    path.display()
                ))
                .await?;
            }
            Err(e) => {
                log::error!("Failed to write export file '{}': {}", path.display(), e);
                self.write(&format!("Export failed: {}\n", e)).await?;
            }
        }
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), ControlError> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }

    pub fn into_output(self) -> W {
        self.out
    }
}
