//! CLI command implementations.

mod call;
mod config;
mod decode;
mod login;

pub use call::{call, CallArgs};
pub use config::show_config;
pub use decode::decode_token;
pub use login::login;

use anyhow::Result;
use storefront_auth::{CredentialsInput, GatewayClient, RawProfile, SessionView};
use storefront_config::Config;
use tracing::debug;

/// Resolved password source for a sign-in.
fn resolve_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Ok(rpassword::prompt_password("Password: ")?),
    }
}

/// Build a gateway from config and sign `username` in.
async fn signed_in_client(
    config: &Config,
    username: &str,
    password: Option<String>,
) -> Result<(GatewayClient, SessionView)> {
    let client = GatewayClient::from_config(config)?;
    let password = resolve_password(password)?;

    debug!(username, api = %config.api_base_url, "Signing in from CLI");
    let profile = RawProfile::Credentials(CredentialsInput::new(username, password));
    let view = client.session().sign_in(&profile).await?;

    Ok((client, view))
}
