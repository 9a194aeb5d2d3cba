//! Logging configuration.
//!
//! Logs always go to stderr so that stdout only carries answers.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor `LOG_LEVEL` is set.
const DEFAULT_FILTER: &str = "info";

/// Initializes the global tracing subscriber writing to stderr.
///
/// The filter is read from `RUST_LOG`, then `LOG_LEVEL`, then defaults to `info`.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(
            std::env::var("RUST_LOG").ok(),
            std::env::var("LOG_LEVEL").ok(),
        ))
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the filter from the two environment sources.
fn resolve_filter(rust_log: Option<String>, log_level: Option<String>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| log_level.and_then(|level| EnvFilter::try_new(level_directive(&level)).ok()))
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Maps `LOG_LEVEL` values, including Python-style names, onto tracing levels.
fn level_directive(level: &str) -> String {
    match level.trim().to_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}
