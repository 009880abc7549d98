//! Ingestion loop: broker connection lifecycle and message consumption
//!
//! Per attempt: Disconnected → Connecting → QueueReady → Consuming, back to
//! Disconnected on any transport failure. Only shutdown ends the loop.

use super::{
    backoff::ReconnectBackoff,
    connection::{BrokerSession, ConsumerError},
    delivery::InboundMessage,
    handler::handle_payload,
};
use crate::{config::BrokerConfig, shutdown::ShutdownSignal, state::AggregateStore};
use futures_util::{Stream, StreamExt};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::time::MissedTickBehavior;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Run the consumer until shutdown, reconnecting after every failure
pub async fn run_consumer(
    broker: BrokerConfig,
    reconnect_delay: Duration,
    store: Arc<AggregateStore>,
    shutdown: ShutdownSignal,
) {
    log::info!("🚀 Starting RabbitMQ consumer task (queue: {})", broker.queue);

    run_with_reconnect(reconnect_delay, &shutdown, || {
        run_session(&broker, &store, &shutdown)
    })
    .await;

    log::info!("RabbitMQ consumer task finished");
}

/// Repeat `attempt` until it returns `Ok` or shutdown is requested
///
/// Every error is logged and retried after the reconnect delay; a missing or
/// incompatible queue is no exception.
pub async fn run_with_reconnect<F, Fut>(
    reconnect_delay: Duration,
    shutdown: &ShutdownSignal,
    mut attempt: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), ConsumerError>>,
{
    let mut backoff = ReconnectBackoff::new(reconnect_delay);

    while !shutdown.is_triggered() {
        match attempt().await {
            Ok(()) => break,
            Err(e @ ConsumerError::QueueDeclare { .. }) => {
                log::error!("❌ {}. Check RabbitMQ setup. Retrying connection...", e);
            }
            Err(e) if e.is_session_failure() => {
                backoff.reset();
                log::error!(
                    "❌ RabbitMQ consumer error: {}. Retrying in {}s...",
                    e,
                    reconnect_delay.as_secs_f64()
                );
            }
            Err(e) => {
                log::error!(
                    "❌ RabbitMQ connection error: {}. Retrying in {}s...",
                    e,
                    reconnect_delay.as_secs_f64()
                );
            }
        }

        if !backoff.sleep(shutdown).await {
            break;
        }
    }
}

/// One connection attempt: connect, set up, consume, close
async fn run_session(
    broker: &BrokerConfig,
    store: &AggregateStore,
    shutdown: &ShutdownSignal,
) -> Result<(), ConsumerError> {
    // Only the connect step races shutdown; an established connection is
    // always closed below.
    let connection = tokio::select! {
        biased;
        _ = shutdown.wait() => return Ok(()),
        connection = BrokerSession::connect(broker) => connection?,
    };
    let session = BrokerSession::establish(connection, broker).await?;

    let result = match session.consume().await {
        Ok(consumer) => {
            log::info!("👂 Waiting for messages on queue '{}'...", session.queue());
            let deliveries = consumer.map(|next| next.map_err(ConsumerError::Delivery));
            consume_deliveries(deliveries, store, shutdown).await
        }
        Err(e) => Err(e),
    };

    let reason = if result.is_ok() { "Normal Exit" } else { "Reconnect Attempt" };
    session.close(reason).await;
    result
}

/// Consume deliveries until shutdown (`Ok`) or a transport failure (`Err`)
///
/// Shutdown is only observed between messages, so a message that has been
/// received is always folded in and acknowledged before the loop exits.
pub async fn consume_deliveries<S, M>(
    mut deliveries: S,
    store: &AggregateStore,
    shutdown: &ShutdownSignal,
) -> Result<(), ConsumerError>
where
    S: Stream<Item = Result<M, ConsumerError>> + Unpin,
    M: InboundMessage,
{
    let mut throughput = ThroughputCounter::new();
    let mut report = tokio::time::interval_at(
        tokio::time::Instant::now() + THROUGHPUT_LOG_INTERVAL,
        THROUGHPUT_LOG_INTERVAL,
    );
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                log::info!("Shutdown signal received, stopping consumer iterator");
                return Ok(());
            }
            _ = report.tick() => {
                throughput.log_and_reset();
                continue;
            }
            next = deliveries.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(e),
            None => return Err(ConsumerError::StreamClosed),
        };

        let recorded = handle_payload(store, message.payload());

        // Dropped messages are acknowledged too: they will never become valid
        message.ack().await?;
        throughput.record(recorded);

        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ThroughputReport {
    processed: u64,
    dropped: u64,
    per_sec: f64,
}

/// Message counts since the last periodic report
#[derive(Debug)]
struct ThroughputCounter {
    processed: u64,
    dropped: u64,
    window_start: Instant,
}

impl ThroughputCounter {
    fn new() -> Self {
        Self {
            processed: 0,
            dropped: 0,
            window_start: Instant::now(),
        }
    }

    fn record(&mut self, recorded: bool) {
        if recorded {
            self.processed += 1;
        } else {
            self.dropped += 1;
        }
    }

    /// Close the current window. `None` when nothing arrived in it.
    fn take(&mut self) -> Option<ThroughputReport> {
        let elapsed = self.window_start.elapsed().as_secs_f64();
        self.window_start = Instant::now();

        let processed = std::mem::take(&mut self.processed);
        let dropped = std::mem::take(&mut self.dropped);
        if processed == 0 && dropped == 0 {
            return None;
        }

        Some(ThroughputReport {
            processed,
            dropped,
            per_sec: processed as f64 / elapsed.max(f64::EPSILON),
        })
    }

    fn log_and_reset(&mut self) {
        if let Some(report) = self.take() {
            log::info!(
                "📊 Ingestion rate: {:.1} msgs/sec (processed: {}, dropped: {})",
                report.per_sec,
                report.processed,
                report.dropped
            );
        }
    }
}
