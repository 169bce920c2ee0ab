//! Authentication error types.

use thiserror::Error;

/// Failure to turn a token string into a claim set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not three non-empty dot-separated segments
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Payload segment is not base64url
    #[error("Token payload is not valid base64url: {0}")]
    Base64(String),

    /// Payload is not a JSON object of the expected shape
    #[error("Token payload is not valid JSON: {0}")]
    Json(String),

    /// A required claim is absent
    #[error("Token is missing required claim '{0}'")]
    MissingClaim(&'static str),

    /// Token was already expired when a session was built from it
    #[error("Token has already expired")]
    Expired,
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Access token could not be decoded
    #[error("Token decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Profile lacks a field the backend requires
    #[error("Malformed profile: {0}")]
    MalformedProfile(String),

    /// Backend declined sign-in; reason is the backend's own wording
    #[error("{0}")]
    ExchangeRejected(String),

    /// Refresh failed; the session has been cleared
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No response from the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// 2xx response without the expected token payload
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid state transition in the session FSM
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Sign-in was superseded by a sign-out before it completed
    #[error("Operation cancelled by sign-out")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] storefront_config::CoreError),
}

impl AuthError {
    /// Returns true if this error tore down the session.
    ///
    /// Only a failed refresh does. Every other error leaves existing session
    /// state untouched.
    pub fn is_session_terminal(&self) -> bool {
        matches!(self, AuthError::RefreshFailed(_))
    }

    /// Returns true if the message is meant to be shown to the end user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AuthError::ExchangeRejected(_) | AuthError::MalformedProfile(_)
        )
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
