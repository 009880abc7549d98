//! Sensor Analyzer - queue consumer with interactive statistics console
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin sensor_analyzer
//! ```
//!
//! Configuration comes from the environment (and `.env`); see
//! `AppConfig::from_env` for the full list. Type `help` at the `> ` prompt
//! for console commands.

use dotenv::dotenv;
use log::{error, info};
use sensor_analyzer::{logging::init_logging, AppConfig, Supervisor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging("info");

    let config = AppConfig::from_env().map_err(|e| {
        error!("❌ {}", e);
        e
    })?;

    info!("🚀 Starting Sensor Analyzer Service...");
    info!("   ├─ Broker: {}", config.broker.endpoint());
    info!("   ├─ Queue: {}", config.broker.queue);
    info!("   ├─ Window size: {}", config.window_size);
    info!("   ├─ Prefetch: {}", config.broker.prefetch_count);
    info!("   └─ Reconnect delay: {}s", config.reconnect_delay.as_secs());

    let report = Supervisor::new(config).run().await;

    if !report.is_clean() {
        error!("⚠️  {} task(s) failed during the run", report.failures.len());
    }

    Ok(())
}
