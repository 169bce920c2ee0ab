//! Configuration, paths and logging setup for the storefront session crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    AuthRoutes, Config, DEFAULT_API_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_LEAD_WINDOW_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
