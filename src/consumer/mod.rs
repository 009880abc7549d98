pub mod backoff;
pub mod connection;
pub mod delivery;
pub mod handler;
pub mod ingestion;

pub use connection::{BrokerSession, ConsumerError};
pub use delivery::InboundMessage;
pub use handler::{handle_payload, process_payload, MessageError, SensorReading};
pub use ingestion::{consume_deliveries, run_consumer, run_with_reconnect};
