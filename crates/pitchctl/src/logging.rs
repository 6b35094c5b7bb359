//! Logging setup for pitchctl.
//!
//! Filter priority: PITCH_LOG, then RUST_LOG, then `logging.level` from the
//! config file. Logs go to stderr so command output stays clean.

use tracing_subscriber::EnvFilter;

/// Pick the filter directive to use
pub fn filter_directive(configured: &str) -> String {
    ["PITCH_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(configured: &str) {
    let directive = filter_directive(configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
