//! Identity normalization.
//!
//! Every sign-in source is reduced to one [`ExchangeRequest`] before anything
//! is sent to the backend. Optional fields are always present on the wire,
//! as empty strings when the provider did not supply them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{AuthError, AuthResult};

/// Where a raw profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Credentials,
    Facebook,
    Google,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Credentials => "credentials",
            SourceKind::Facebook => "facebook",
            SourceKind::Google => "google",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Username and password as typed by the user.
#[derive(Clone, Deserialize)]
pub struct CredentialsInput {
    pub username: String,
    pub password: String,
}

impl CredentialsInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for CredentialsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsInput")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Facebook Graph `me` payload. The display name is a single string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacebookProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub picture: Option<Picture>,
}

/// Graph returns either a bare URL or `{"data": {"url": ...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Picture {
    Url(String),
    Nested { data: PictureData },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PictureData {
    pub url: Option<String>,
}

impl Picture {
    fn url(&self) -> Option<&str> {
        match self {
            Picture::Url(url) => Some(url),
            Picture::Nested { data } => data.url.as_deref(),
        }
    }
}

/// Google OpenID userinfo payload. Name parts arrive already split.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleProfile {
    pub sub: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub picture: Option<String>,
}

/// A sign-in input before normalization.
#[derive(Debug, Clone)]
pub enum RawProfile {
    Credentials(CredentialsInput),
    Facebook(FacebookProfile),
    Google(GoogleProfile),
}

impl RawProfile {
    pub fn kind(&self) -> SourceKind {
        match self {
            RawProfile::Credentials(_) => SourceKind::Credentials,
            RawProfile::Facebook(_) => SourceKind::Facebook,
            RawProfile::Google(_) => SourceKind::Google,
        }
    }

    /// Interpret an untyped provider payload as the given source kind.
    pub fn from_json(kind: SourceKind, value: Value) -> AuthResult<Self> {
        let malformed = |e: serde_json::Error| AuthError::MalformedProfile(e.to_string());
        Ok(match kind {
            SourceKind::Credentials => {
                RawProfile::Credentials(serde_json::from_value(value).map_err(malformed)?)
            }
            SourceKind::Facebook => {
                RawProfile::Facebook(serde_json::from_value(value).map_err(malformed)?)
            }
            SourceKind::Google => {
                RawProfile::Google(serde_json::from_value(value).map_err(malformed)?)
            }
        })
    }
}

/// Canonical external identity sent to the external sign-in route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub provider: SourceKind,
    pub provider_id: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub phone: String,
    pub avatar: String,
}

/// Body of a sign-in exchange.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExchangeRequest {
    Credentials { username: String, password: String },
    External(ExternalIdentity),
}

impl ExchangeRequest {
    pub fn source(&self) -> SourceKind {
        match self {
            ExchangeRequest::Credentials { .. } => SourceKind::Credentials,
            ExchangeRequest::External(identity) => identity.provider,
        }
    }
}

impl fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeRequest::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            ExchangeRequest::External(identity) => {
                f.debug_tuple("External").field(identity).finish()
            }
        }
    }
}

/// Reduce a raw profile to the backend's exchange shape.
///
/// Fails with [`AuthError::MalformedProfile`] when a mandatory field is
/// absent. Nothing is sent in that case.
pub fn normalize(profile: &RawProfile) -> AuthResult<ExchangeRequest> {
    match profile {
        RawProfile::Credentials(input) => {
            if input.username.trim().is_empty() {
                return Err(AuthError::MalformedProfile("missing username".to_string()));
            }
            if input.password.is_empty() {
                return Err(AuthError::MalformedProfile("missing password".to_string()));
            }
            Ok(ExchangeRequest::Credentials {
                username: input.username.clone(),
                password: input.password.clone(),
            })
        }
        RawProfile::Facebook(fb) => {
            let email = required_email(fb.email.as_deref())?;
            let (given_name, family_name) = split_display_name(fb.name.as_deref().unwrap_or(""));
            Ok(ExchangeRequest::External(ExternalIdentity {
                provider: SourceKind::Facebook,
                provider_id: or_empty(fb.id.as_deref()),
                email,
                given_name,
                family_name,
                phone: or_empty(fb.phone.as_deref()),
                avatar: or_empty(fb.picture.as_ref().and_then(Picture::url)),
            }))
        }
        RawProfile::Google(google) => {
            let email = required_email(google.email.as_deref())?;
            Ok(ExchangeRequest::External(ExternalIdentity {
                provider: SourceKind::Google,
                provider_id: or_empty(google.sub.as_deref()),
                email,
                given_name: or_empty(google.given_name.as_deref()),
                family_name: or_empty(google.family_name.as_deref()),
                phone: or_empty(google.phone_number.as_deref()),
                avatar: or_empty(google.picture.as_deref()),
            }))
        }
    }
}

fn required_email(email: Option<&str>) -> AuthResult<String> {
    match email.map(str::trim) {
        Some(email) if !email.is_empty() => Ok(email.to_string()),
        _ => Err(AuthError::MalformedProfile("missing email".to_string())),
    }
}

fn or_empty(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Last whitespace token is the given name, the rest is the family name.
fn split_display_name(name: &str) -> (String, String) {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    match tokens.pop() {
        Some(given) => (given.to_string(), tokens.join(" ")),
        None => (String::new(), String::new()),
    }
}
