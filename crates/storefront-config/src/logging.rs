//! Logging initialization.
//!
//! Maps [`Config`] onto the observability crate's [`LogConfig`]. Library
//! crates never call this; only binaries do, once, at startup.

use crate::{Config, CoreResult};
use observability::LogConfig;

/// Initialize the logging system for a storefront binary.
///
/// - Level from `RUST_LOG` or `config.log_level`
/// - Compact stderr output
/// - JSONL file output when `config.log_file` is set
///
/// ```ignore
/// init_logging("storefront", &config)?;
/// tracing::info!("ready");
/// ```
pub fn init_logging(service_name: &str, config: &Config) -> CoreResult<()> {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(&config.log_level).as_str().to_ascii_lowercase(),
        log_path: config.log_file.clone(),
        also_stderr: true,
    })?;
    Ok(())
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
