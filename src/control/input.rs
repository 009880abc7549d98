use std::io::BufRead;
use tokio::sync::mpsc;

const INPUT_BUFFER: usize = 16;

/// Event from the console reader thread
#[derive(Debug)]
pub enum ConsoleInput {
    Line(String),
    /// The input source failed; no further lines will arrive
    Unavailable(std::io::Error),
}

/// Channel closes on end-of-input
pub type ConsoleReceiver = mpsc::Receiver<ConsoleInput>;

/// Start reading process stdin on a dedicated thread
///
/// Terminal reads block, so they stay off the runtime: the thread is never
/// joined and cannot delay shutdown. Returns `None` when the thread cannot be
/// started.
pub fn spawn_stdin_reader() -> Option<ConsoleReceiver> {
    spawn_reader("console-stdin", || std::io::stdin().lock())
}

/// Start a reader thread over any line source
pub fn spawn_reader<F, R>(name: &str, open: F) -> Option<ConsoleReceiver>
where
    F: FnOnce() -> R + Send + 'static,
    R: BufRead,
{
    let (tx, rx) = mpsc::channel(INPUT_BUFFER);

    let spawned = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || forward_lines(open(), tx));

    match spawned {
        Ok(_) => Some(rx),
        Err(e) => {
            log::warn!("Console reader thread could not start: {}", e);
            None
        }
    }
}

/// Forward lines until end-of-input, a read error, or the receiver going away
fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<ConsoleInput>) {
    for line in reader.lines() {
        let event = match line {
            Ok(line) => ConsoleInput::Line(line),
            Err(e) => {
                let _ = tx.blocking_send(ConsoleInput::Unavailable(e));
                return;
            }
        };
        if tx.blocking_send(event).is_err() {
            return;
        }
    }
}
