//! Logging setup for the `tessera` binary.
//!
//! Logging is off unless requested through the environment, and always goes
//! to stderr so command output on stdout stays clean.
//!
//! # Environment Variables
//!
//! - `TESSERA_DEBUG=true` - Enable debug logging
//! - `TESSERA_DEBUG=1` - Enable debug logging
//! - `TESSERA_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `TESSERA_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `TESSERA_DEBUG`.
///
/// Returns `true` if `TESSERA_DEBUG` is set to "true", "1", or "yes" (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("TESSERA_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `TESSERA_LOG_LEVEL`.
///
/// Defaults to "debug" if `TESSERA_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("TESSERA_LOG_LEVEL") {
        Ok(level) => parse_level(&level).unwrap_or(fallback),
        Err(_) => fallback,
    }
}

/// Get the configured log format from `TESSERA_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("TESSERA_LOG_FORMAT")
        .map(|f| parse_format(&f))
        .unwrap_or("json")
}

fn parse_level(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn parse_format(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "pretty" => "pretty",
        "compact" => "compact",
        _ => "json",
    }
}

/// Initialize logging. Subsequent calls are no-ops.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("TESSERA_LOG_LEVEL").is_err() {
            return;
        }

        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = get_log_level();
        let filter = EnvFilter::try_new(format!(
            "tessera={},tessera_cli={},tessera_migrate={},tessera_schema={}",
            level, level, level, level
        ))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

        let layer = fmt::layer().with_writer(std::io::stderr);
        match get_log_format() {
            "json" => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init(),
            "compact" => tracing_subscriber::registry()
                .with(filter)
                .with(layer.compact())
                .init(),
            _ => tracing_subscriber::registry()
                .with(filter)
                .with(layer.pretty())
                .init(),
        }

        tracing::debug!(level, format = get_log_format(), "Tessera logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some("debug"));
        assert_eq!(parse_level("warn"), Some("warn"));
        assert_eq!(parse_level("verbose"), None);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("Pretty"), "pretty");
        assert_eq!(parse_format("compact"), "compact");
        assert_eq!(parse_format("xml"), "json");
    }
}
