use std::io::Write;

/// Broker client crates that are chatty at info level
const QUIET_MODULES: [&str; 4] = ["lapin", "amq_protocol", "async_io", "polling"];

/// Initialise the global logger
///
/// Logs go to stderr so the operator console owns stdout. Respects `RUST_LOG`,
/// falling back to `default_filter`. Calling this twice is harmless.
pub fn init_logging(default_filter: &str) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));

    // Keep broker client noise at warn unless explicitly requested
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    for module in QUIET_MODULES {
        if !log_level.contains(module) {
            builder.filter_module(module, log::LevelFilter::Warn);
        }
    }

    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}
