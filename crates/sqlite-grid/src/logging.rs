use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. stdout carries the NDJSON protocol and must stay clean.
pub fn init(log_level: &str) {
    // RUST_LOG wins over --log-level when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
