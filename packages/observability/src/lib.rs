//! # Observability
//!
//! Logging setup shared by the storefront crates.
//!
//! Library crates only ever use `tracing` macros. Binaries call
//! [`init_with_config`] once at startup to decide where the events go:
//!
//! - a compact human-readable stream on stderr
//! - an optional append-only JSONL file, one entry per line
//!
//! Both sinks share the same level filter, taken from `RUST_LOG` when set and
//! from [`LogConfig::default_level`] otherwise. The JSONL sink redacts values
//! that look like credentials before they hit disk.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "storefront".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/tmp/storefront.jsonl".into()),
//!     ..Default::default()
//! })?;
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{redact_value, JsonLayer, LogEntry};
pub use writer::{FileLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSONL entry.
    pub service_name: String,

    /// Default level filter (e.g. "debug", "info", "warn").
    /// `RUST_LOG` takes precedence when set.
    pub default_level: String,

    /// JSONL output file. No file sink is installed when `None`.
    pub log_path: Option<PathBuf>,

    /// Emit compact logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Fails only when the JSONL file cannot be opened. Installing a second global
/// subscriber is not an error; the first one stays in place.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    let file_layer = match &config.log_path {
        Some(path) => {
            let writer = FileLogWriter::new(path)?;
            Some(
                JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer))
                    .with_filter(build_filter(&config.default_level)),
            )
        }
        None => None,
    };

    let stderr_layer = if config.also_stderr {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .with_filter(build_filter(&config.default_level)),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }

    Ok(())
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
