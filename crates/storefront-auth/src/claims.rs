//! Access token payload decoding.
//!
//! Tokens are compact JWTs. Only the payload segment is read; the signature
//! is the backend's business and is never verified here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::store::SessionView;

/// Identity and expiry claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    pub subject: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub avatar: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
}

#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
    name: Option<String>,
    role: Option<String>,
    avatar: Option<String>,
    iat: Option<i64>,
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl From<Audience> for Vec<String> {
    fn from(aud: Audience) -> Self {
        match aud {
            Audience::One(single) => vec![single],
            Audience::Many(list) => list,
        }
    }
}

/// Decode a token's payload into a [`ClaimSet`].
pub fn decode(token: &str) -> Result<ClaimSet, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::Malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(DecodeError::Malformed("empty segment".to_string()));
    }

    // Some issuers pad; the engine does not accept it.
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;

    let subject = raw.sub.ok_or(DecodeError::MissingClaim("sub"))?;
    let email = raw.email.ok_or(DecodeError::MissingClaim("email"))?;
    let exp = raw.exp.ok_or(DecodeError::MissingClaim("exp"))?;

    Ok(ClaimSet {
        subject,
        email,
        expires_at: timestamp(exp, "exp")?,
        name: raw.name,
        role: raw.role,
        avatar: raw.avatar,
        issued_at: raw.iat.map(|iat| timestamp(iat, "iat")).transpose()?,
        issuer: raw.iss,
        audience: raw.aud.map(Vec::from).unwrap_or_default(),
    })
}

fn timestamp(secs: i64, claim: &str) -> Result<DateTime<Utc>, DecodeError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| DecodeError::Json(format!("claim '{}' is out of range", claim)))
}

impl ClaimSet {
    /// Reject a claim set that is already expired at `now`.
    pub fn ensure_live(&self, now: DateTime<Utc>) -> Result<(), DecodeError> {
        if self.expires_at > now {
            Ok(())
        } else {
            Err(DecodeError::Expired)
        }
    }

    /// True once `now` has reached `expires_at - lead_window`.
    pub fn refresh_due(&self, now: DateTime<Utc>, lead_window: std::time::Duration) -> bool {
        let threshold = Duration::from_std(lead_window)
            .ok()
            .and_then(|lead| self.expires_at.checked_sub_signed(lead));
        match threshold {
            Some(threshold) => now >= threshold,
            None => true,
        }
    }

    /// Non-sensitive projection for display.
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.subject.clone(),
            name: self.name.clone().unwrap_or_default(),
            email: self.email.clone(),
            role: self.role.clone(),
            avatar_url: self.avatar.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE;
    use serde_json::json;

    fn token_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.c2lnbmF0dXJl", header, body)
    }

    #[test]
    fn test_decode_full_claim_set() {
        let token = token_with(json!({
            "sub": "user-42",
            "email": "ann@shop.test",
            "exp": 1_900_000_000,
            "iat": 1_899_996_400,
            "name": "Ann Lee",
            "role": "customer",
            "avatar": "https://cdn.shop.test/ann.png",
            "iss": "storefront",
            "aud": "web"
        }));

        let expected = ClaimSet {
            subject: "user-42".to_string(),
            email: "ann@shop.test".to_string(),
            expires_at: DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
            name: Some("Ann Lee".to_string()),
            role: Some("customer".to_string()),
            avatar: Some("https://cdn.shop.test/ann.png".to_string()),
            issued_at: DateTime::from_timestamp(1_899_996_400, 0),
            issuer: Some("storefront".to_string()),
            audience: vec!["web".to_string()],
        };
        assert_eq!(decode(&token).unwrap(), expected);
    }

    #[test]
    fn test_decode_minimal_claims_leaves_optionals_empty() {
        let token = token_with(json!({"sub": "u", "email": "u@shop.test", "exp": 1_900_000_000}));
        let claims = decode(&token).unwrap();
        assert!(claims.name.is_none());
        assert!(claims.issued_at.is_none());
        assert!(claims.audience.is_empty());
    }

    #[test]
    fn test_audience_array() {
        let token = token_with(json!({
            "sub": "u", "email": "u@shop.test", "exp": 1_900_000_000,
            "aud": ["web", "mobile"]
        }));
        assert_eq!(decode(&token).unwrap().audience, vec!["web", "mobile"]);
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let body = URL_SAFE.encode(r#"{"sub":"u","email":"e@x.io","exp":1900000000}"#);
        let token = format!("{}.{}.sig", header, body);
        assert_eq!(decode(&token).unwrap().subject, "u");
    }

    #[test]
    fn test_missing_required_claim() {
        let token = token_with(json!({"sub": "u", "exp": 1_900_000_000}));
        assert_eq!(decode(&token), Err(DecodeError::MissingClaim("email")));

        let token = token_with(json!({"sub": "u", "email": "u@shop.test"}));
        assert_eq!(decode(&token), Err(DecodeError::MissingClaim("exp")));
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(decode("abc"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("a.b.c.d"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("a..c"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode("a.!!!.c"), Err(DecodeError::Base64(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode(&not_json), Err(DecodeError::Json(_))));

        let wrong_type = token_with(json!({"sub": 7, "email": "e", "exp": 1}));
        assert!(matches!(decode(&wrong_type), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_ensure_live() {
        let token = token_with(json!({"sub": "u", "email": "e@x.io", "exp": 1_900_000_000}));
        let claims = decode(&token).unwrap();

        let before = Utc.timestamp_opt(1_899_999_999, 0).unwrap();
        let at = Utc.timestamp_opt(1_900_000_000, 0).unwrap();
        assert!(claims.ensure_live(before).is_ok());
        assert_eq!(claims.ensure_live(at), Err(DecodeError::Expired));
    }

    #[test]
    fn test_refresh_due_boundary() {
        let token = token_with(json!({"sub": "u", "email": "e@x.io", "exp": 1_900_000_000}));
        let claims = decode(&token).unwrap();
        let lead = std::time::Duration::from_secs(30);

        let outside = Utc.timestamp_opt(1_900_000_000 - 31, 0).unwrap();
        let boundary = Utc.timestamp_opt(1_900_000_000 - 30, 0).unwrap();
        let inside = Utc.timestamp_opt(1_900_000_000 - 29, 0).unwrap();

        assert!(!claims.refresh_due(outside, lead));
        assert!(claims.refresh_due(boundary, lead));
        assert!(claims.refresh_due(inside, lead));
    }

    #[test]
    fn test_view_projection() {
        let token = token_with(json!({
            "sub": "user-42", "email": "ann@shop.test", "exp": 1_900_000_000,
            "name": "Ann Lee", "avatar": "https://cdn.shop.test/ann.png"
        }));
        let view = decode(&token).unwrap().view();
        assert_eq!(view.id, "user-42");
        assert_eq!(view.name, "Ann Lee");
        assert_eq!(view.role, None);
        assert_eq!(view.avatar_url.as_deref(), Some("https://cdn.shop.test/ann.png"));
    }
}
