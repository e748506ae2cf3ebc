//! Tracing setup for the daemon.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// The filter comes from `CLOVE_LOG` (falling back to `default_directive`,
/// e.g. `"info"`). Safe to call more than once; later calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env("CLOVE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
