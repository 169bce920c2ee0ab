//! Configuration management.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Default backend API base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/";

/// Default proactive refresh window, in seconds before access token expiry.
pub const DEFAULT_REFRESH_LEAD_WINDOW_SECS: u64 = 30;

/// Default per-request transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Backend routes used by the session lifecycle, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRoutes {
    /// Username/password exchange.
    pub sign_in: String,
    /// Exchange for a normalized external provider profile.
    pub external_sign_in: String,
    /// Token pair rotation.
    pub refresh: String,
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self {
            sign_in: "auth/login".to_string(),
            external_sign_in: "auth/login-external".to_string(),
            refresh: "auth/refresh-token".to_string(),
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend API base URL. Actions resolve relative to it.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Seconds before expiry at which a refresh is triggered.
    #[serde(default = "default_refresh_lead_window_secs")]
    pub refresh_lead_window_secs: u64,
    /// Transport timeout for every outbound call.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub routes: AuthRoutes,
    /// Optional JSONL log file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_refresh_lead_window_secs() -> u64 {
    DEFAULT_REFRESH_LEAD_WINDOW_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            refresh_lead_window_secs: DEFAULT_REFRESH_LEAD_WINDOW_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            routes: AuthRoutes::default(),
            log_file: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from `~/.storefront/config.json` if present, then
    /// apply environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file. Unlike [`Config::load`], a
    /// missing file is an error.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::MissingConfigFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from `STOREFRONT_*` environment variables.
    pub fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(level) = get("STOREFRONT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("STOREFRONT_API_URL") {
            self.api_base_url = url;
        }
        if let Some(raw) = get("STOREFRONT_REFRESH_LEAD_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.refresh_lead_window_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOREFRONT_REFRESH_LEAD_SECS"),
            }
        }
        if let Some(raw) = get("STOREFRONT_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid STOREFRONT_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    /// Reject values the gateway cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.request_timeout_secs == 0 {
            return Err(CoreError::invalid(
                "request_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// The API base URL, parsed and normalized to end with `/` so that
    /// relative actions resolve beneath it.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let mut raw = self.api_base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }

        let url = Url::parse(&raw)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::invalid(
                "api_base_url",
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    pub fn refresh_lead_window(&self) -> Duration {
        Duration::from_secs(self.refresh_lead_window_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.refresh_lead_window(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.routes.refresh, "auth/refresh-token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "api_base_url": "https://shop.example.com/api",
                "refresh_lead_window_secs": 45
            }"#,
        )
        .unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.api_base_url, "https://shop.example.com/api");
        assert_eq!(config.refresh_lead_window_secs, 45);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.routes, AuthRoutes::default());
    }

    #[test]
    fn test_save_then_load_through_paths() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "debug".to_string(),
            api_base_url: "https://shop.example.com/api/".to_string(),
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "debug");
        assert_eq!(loaded.api_base_url, "https://shop.example.com/api/");
    }

    #[test]
    fn test_overrides_apply_and_ignore_bad_numbers() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("STOREFRONT_LOG_LEVEL", "trace"),
            ("STOREFRONT_API_URL", "https://api.example.com"),
            ("STOREFRONT_REFRESH_LEAD_SECS", "60"),
            ("STOREFRONT_REQUEST_TIMEOUT_SECS", "soon"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_level, "trace");
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.refresh_lead_window_secs, 60);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "STOREFRONT_API_URL").then(|| "  ".to_string()));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_api_base_url_gets_trailing_slash() {
        let config = Config {
            api_base_url: "https://shop.example.com/api".to_string(),
            ..Config::default()
        };
        let url = config.api_base_url().unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/api/");
        assert_eq!(
            url.join("products/42").unwrap().as_str(),
            "https://shop.example.com/api/products/42"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_scheme = Config {
            api_base_url: "ftp://shop.example.com".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            bad_scheme.validate(),
            Err(CoreError::InvalidValue { key: "api_base_url", .. })
        ));

        let unparsable = Config {
            api_base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(unparsable.validate(), Err(CoreError::InvalidUrl(_))));

        let zero_timeout = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            zero_timeout.validate(),
            Err(CoreError::InvalidValue { key: "request_timeout_secs", .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("absent.json");
        assert!(matches!(
            Config::load_from_file(&missing),
            Err(CoreError::MissingConfigFile(path)) if path == missing
        ));
    }
}
