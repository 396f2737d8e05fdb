//! Subscriber setup for the binaries. The library itself only emits `tracing` events.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, e.g. `clipstash=debug`
pub const LOG_ENV_VAR: &str = "CLIPSTASH_LOG";

/// Filter from `CLIPSTASH_LOG`, else `default_filter`, else `info`
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr so stdout stays machine-readable. A second call is a no-op.
pub fn init(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
