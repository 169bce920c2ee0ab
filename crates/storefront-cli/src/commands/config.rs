//! Effective configuration.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use storefront_config::Config;

pub fn show_config(config: &Config, format: &OutputFormat) -> Result<()> {
    output::print_with(config, format, |config: &Config| {
        output::print_heading("Configuration");
        output::print_row("API base URL", &config.api_base_url);
        output::print_row("Log level", &config.log_level);
        output::print_row(
            "Refresh lead",
            &format!("{}s", config.refresh_lead_window_secs),
        );
        output::print_row("Timeout", &format!("{}s", config.request_timeout_secs));
        output::print_row("Sign-in route", &config.routes.sign_in);
        output::print_row("External route", &config.routes.external_sign_in);
        output::print_row("Refresh route", &config.routes.refresh);
        let log_file = config
            .log_file
            .as_ref()
            .map(|p| p.display().to_string());
        output::print_row("Log file", output::or_dash(log_file.as_deref()));
    });
    Ok(())
}
