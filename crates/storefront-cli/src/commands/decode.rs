//! Token inspection.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::Utc;
use storefront_auth::ClaimSet;

/// Decode a token's claims without verifying it.
pub fn decode_token(token: &str, format: &OutputFormat) -> Result<()> {
    let claims = storefront_auth::decode(token)?;

    output::print_with(&claims, format, |claims: &ClaimSet| {
        output::print_heading("Token claims");
        output::print_row("Subject", &claims.subject);
        output::print_row("Email", &claims.email);
        output::print_row("Name", output::or_dash(claims.name.as_deref()));
        output::print_row("Role", output::or_dash(claims.role.as_deref()));
        output::print_row("Avatar", output::or_dash(claims.avatar.as_deref()));
        output::print_row("Issuer", output::or_dash(claims.issuer.as_deref()));
        if !claims.audience.is_empty() {
            output::print_row("Audience", &claims.audience.join(", "));
        }
        if let Some(issued_at) = claims.issued_at {
            output::print_row("Issued at", &issued_at.to_rfc3339());
        }
        output::print_row("Expires at", &claims.expires_at.to_rfc3339());

        let status = if claims.ensure_live(Utc::now()).is_ok() {
            "live"
        } else {
            "expired"
        };
        output::print_row("Status", status);
    });

    Ok(())
}
