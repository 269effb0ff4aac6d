// Logging setup
// The library only emits tracing events; installing a subscriber is left to
// the binary (or whatever host embeds the magic)

use tracing_subscriber::EnvFilter;

/// Default filter when RUST_LOG is not set
pub const DEFAULT_FILTER: &str = "warn";

/// Install a stderr subscriber, honouring RUST_LOG
///
/// Stdout stays reserved for result tables.
pub fn init_stderr_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // try_init so a second call (e.g. from tests) is a no-op instead of a panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
