use tracing_subscriber::{fmt, EnvFilter};

/// Install the global stdout subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL`; `default_level` applies when neither is set.
/// A second call is a no-op, so workers and tests can both call it.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
