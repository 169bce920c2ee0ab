//! Sign-in command.

use super::signed_in_client;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use storefront_auth::SessionView;
use storefront_config::Config;

/// Sign in with username and password and show who we are.
///
/// Sessions live in memory only, so this mostly checks credentials and the
/// backend wiring.
pub async fn login(
    config: &Config,
    username: &str,
    password: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let (client, view) = signed_in_client(config, username, password).await?;

    output::print_with(&view, format, |view: &SessionView| {
        output::print_success(&format!("Logged in as {}", view.email), format);
        output::print_row("User ID", &view.id);
        output::print_row("Name", output::or_dash(Some(&view.name)));
        output::print_row("Role", output::or_dash(view.role.as_deref()));
        if let Some(expires_at) = client.session().snapshot().expires_at {
            output::print_row("Token expires", &expires_at.to_rfc3339());
        }
    });

    client.session().sign_out();
    Ok(())
}
