//! Sensor Analyzer: rolling per-sensor statistics over an AMQP reading stream
//!
//! ```text
//! RabbitMQ queue → consumer (ingestion loop) → AggregateStore ← console (control loop)
//!                                                                 ↓
//!                                                          stdout / JSON export
//! ```
//!
//! The [`supervisor::Supervisor`] owns both loops and the shared
//! [`shutdown::ShutdownSignal`].

pub mod config;
pub mod consumer;
pub mod control;
pub mod logging;
pub mod shutdown;
pub mod state;
pub mod stats;
pub mod supervisor;
pub mod window;

pub use config::AppConfig;
pub use shutdown::ShutdownSignal;
pub use state::{AggregateStore, StoreSnapshot};
pub use supervisor::{ShutdownReport, Supervisor};
pub use window::{ReadingSnapshot, SensorWindow};
