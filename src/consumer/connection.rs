use crate::config::BrokerConfig;
use lapin::{
    options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer,
};
use std::time::Duration;

const CONSUMER_TAG: &str = "sensor-analyzer";

/// Transport-level failures. All of them are retried by the ingestion loop.
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    #[error("connection failed: {0}")]
    Connect(#[source] lapin::Error),
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("channel setup failed: {0}")]
    Channel(#[source] lapin::Error),
    #[error("queue '{queue}' not found or incompatible: {source}")]
    QueueDeclare {
        queue: String,
        #[source]
        source: lapin::Error,
    },
    #[error("failed to start consumer: {0}")]
    Consume(#[source] lapin::Error),
    #[error("delivery stream failed: {0}")]
    Delivery(#[source] lapin::Error),
    #[error("failed to acknowledge delivery: {0}")]
    Ack(#[source] lapin::Error),
    #[error("delivery stream closed by broker")]
    StreamClosed,
}

impl ConsumerError {
    /// True for failures after the session was fully set up
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            Self::Consume(_) | Self::Delivery(_) | Self::Ack(_) | Self::StreamClosed
        )
    }
}

/// One open connection with its channel, prefetch set and queue verified
pub struct BrokerSession {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl BrokerSession {
    /// Open the TCP/AMQP connection, bounded by the configured timeout
    ///
    /// Dropping this future before it resolves leaves no connection behind.
    pub async fn connect(config: &BrokerConfig) -> Result<Connection, ConsumerError> {
        log::info!("🔌 Attempting connection to RabbitMQ at {}...", config.endpoint());

        let connection = tokio::time::timeout(
            config.connect_timeout,
            Connection::connect(&config.amqp_uri(), ConnectionProperties::default()),
        )
        .await
        .map_err(|_| ConsumerError::ConnectTimeout(config.connect_timeout))?
        .map_err(ConsumerError::Connect)?;

        log::info!("✅ RabbitMQ connection successful");
        Ok(connection)
    }

    /// Open a channel, apply prefetch, then passively declare the queue
    ///
    /// The queue must already exist; this never creates topology. On failure
    /// the connection is closed before the error is returned.
    pub async fn establish(
        connection: Connection,
        config: &BrokerConfig,
    ) -> Result<Self, ConsumerError> {
        match Self::prepare_channel(&connection, config).await {
            Ok(channel) => Ok(Self {
                connection,
                channel,
                queue: config.queue.clone(),
            }),
            Err(e) => {
                close_connection(&connection, "Setup failed").await;
                Err(e)
            }
        }
    }

    async fn prepare_channel(
        connection: &Connection,
        config: &BrokerConfig,
    ) -> Result<Channel, ConsumerError> {
        let channel = connection
            .create_channel()
            .await
            .map_err(ConsumerError::Channel)?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(ConsumerError::Channel)?;

        let queue = channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    passive: true,
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| ConsumerError::QueueDeclare {
                queue: config.queue.clone(),
                source,
            })?;

        log::info!(
            "📬 Queue '{}' ready: {} messages waiting, {} consumers, prefetch {}",
            config.queue,
            queue.message_count(),
            queue.consumer_count(),
            config.prefetch_count
        );

        Ok(channel)
    }

    /// Start a manual-ack consumer on the verified queue
    pub async fn consume(&self) -> Result<Consumer, ConsumerError> {
        self.channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(ConsumerError::Consume)
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close channel and connection if they are still open
    pub async fn close(self, reason: &str) {
        if self.channel.status().connected() {
            if let Err(e) = self.channel.close(200, reason).await {
                log::debug!("Channel close failed: {}", e);
            }
        }
        close_connection(&self.connection, reason).await;
    }
}

async fn close_connection(connection: &Connection, reason: &str) {
    if !connection.status().connected() {
        return;
    }
    log::info!("Closing RabbitMQ connection ({})", reason);
    if let Err(e) = connection.close(200, reason).await {
        log::debug!("Connection close failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_failures_distinguished_from_setup() {
        assert!(ConsumerError::StreamClosed.is_session_failure());
        assert!(ConsumerError::Delivery(lapin::Error::ChannelsLimitReached).is_session_failure());
        assert!(!ConsumerError::ConnectTimeout(Duration::from_secs(1)).is_session_failure());
        assert!(!ConsumerError::QueueDeclare {
            queue: "sensor_queue".to_string(),
            source: lapin::Error::ChannelsLimitReached,
        }
        .is_session_failure());
    }
}
