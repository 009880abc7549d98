use super::connection::ConsumerError;
use async_trait::async_trait;
use lapin::{message::Delivery, options::BasicAckOptions};

/// A received message that is acknowledged once it has been handled
#[async_trait]
pub trait InboundMessage: Send {
    fn payload(&self) -> &[u8];

    /// Consumes the message; it cannot be acknowledged twice
    async fn ack(self) -> Result<(), ConsumerError>;
}

#[async_trait]
impl InboundMessage for Delivery {
    fn payload(&self) -> &[u8] {
        &self.data
    }

    async fn ack(self) -> Result<(), ConsumerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(ConsumerError::Ack)
    }
}
