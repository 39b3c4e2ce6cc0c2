//! Logging initialization.
//!
//! Thin wrapper over the observability package so every BookHive host
//! configures tracing the same way: JSONL to `~/.bookhive/logs/bookhive.jsonl`,
//! level from `RUST_LOG` or the configured default.

use observability::LogConfig;

/// Initialize logging for the default `bookhive` service.
pub fn init_logging(level: &str) {
    init_logging_for_service("bookhive", level);
}

/// Initialize logging with a custom service name.
///
/// Set `BOOKHIVE_LOG_STDERR=1` to mirror events on stderr.
pub fn init_logging_for_service(service_name: &str, level: &str) {
    let also_stderr = std::env::var("BOOKHIVE_LOG_STDERR")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        also_stderr,
        ..Default::default()
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
