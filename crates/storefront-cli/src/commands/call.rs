//! One-off gateway call.

use super::signed_in_client;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use std::path::PathBuf;
use storefront_auth::{GatewayClient, GatewayOutcome, Method, RequestBody};
use storefront_config::Config;

/// Arguments for `storefront call`.
pub struct CallArgs {
    pub action: String,
    pub method: Method,
    pub body: Option<String>,
    pub binary: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn call(config: &Config, args: CallArgs, format: &OutputFormat) -> Result<()> {
    let body = request_body(args.body.as_deref(), args.binary.as_deref())?;

    let client = match &args.username {
        Some(username) => signed_in_client(config, username, args.password).await?.0,
        None => GatewayClient::from_config(config)?,
    };

    let outcome = client.request(&args.action, args.method, body).await;
    client.session().sign_out();

    output::print_with(&outcome, format, print_outcome);

    if outcome.is_success() {
        Ok(())
    } else {
        anyhow::bail!("request ended with {}", outcome.tag())
    }
}

fn request_body(json: Option<&str>, binary: Option<&std::path::Path>) -> Result<Option<RequestBody>> {
    match (json, binary) {
        (Some(_), Some(_)) => anyhow::bail!("--body and --binary are mutually exclusive"),
        (Some(raw), None) => {
            let value = serde_json::from_str(raw).context("--body is not valid JSON")?;
            Ok(Some(RequestBody::Json(value)))
        }
        (None, Some(path)) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Some(RequestBody::Binary(bytes)))
        }
        (None, None) => Ok(None),
    }
}

fn print_outcome(outcome: &GatewayOutcome) {
    match outcome {
        GatewayOutcome::Success { payload } => {
            match serde_json::to_string_pretty(payload) {
                Ok(json) => println!("{}", json),
                Err(_) => println!("{}", payload),
            }
        }
        GatewayOutcome::ValidationFailure { field, message } => {
            output::print_heading("Validation failed");
            output::print_row("Field", field);
            output::print_row("Message", message);
        }
        GatewayOutcome::Unauthorized => {
            println!("Unauthorized: sign in again with --username");
        }
        GatewayOutcome::ServerError { message } => {
            output::print_heading("Server error");
            output::print_row("Message", message);
        }
        GatewayOutcome::TransportError { message } => {
            output::print_heading("Backend unreachable");
            output::print_row("Detail", message);
        }
    }
}
