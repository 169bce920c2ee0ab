//! In-memory session holder.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::claims::ClaimSet;

/// Access and refresh tokens as issued by the backend.
///
/// Both values are opaque. A refresh produces a new pair; the old refresh
/// token is burned.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Decoded identity plus the tokens it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: ClaimSet,
    pub tokens: TokenPair,
}

/// The part of a session safe to hand to UI code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub avatar_url: Option<String>,
}

/// Holder for the current session. Writes replace the whole value.
#[derive(Default)]
pub(crate) struct SessionStore {
    current: RwLock<Option<Arc<Session>>>,
}

impl SessionStore {
    pub(crate) fn get(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub(crate) fn set(&self, session: Session) {
        *self.current.write() = Some(Arc::new(session));
    }

    pub(crate) fn clear(&self) {
        *self.current.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(access: &str) -> Session {
        Session {
            identity: ClaimSet {
                subject: "user-1".to_string(),
                email: "a@shop.test".to_string(),
                expires_at: Utc.timestamp_opt(1_900_000_000, 0).unwrap(),
                name: None,
                role: None,
                avatar: None,
                issued_at: None,
                issuer: None,
                audience: Vec::new(),
            },
            tokens: TokenPair::new(access, "refresh"),
        }
    }

    #[test]
    fn test_store_starts_empty() {
        assert!(SessionStore::default().get().is_none());
    }

    #[test]
    fn test_set_replaces_whole_session() {
        let store = SessionStore::default();
        store.set(session("first"));
        let held = store.get().unwrap();

        store.set(session("second"));

        // Earlier readers keep the value they were handed.
        assert_eq!(held.tokens.access_token(), "first");
        assert_eq!(store.get().unwrap().tokens.access_token(), "second");
    }

    #[test]
    fn test_clear() {
        let store = SessionStore::default();
        store.set(session("a"));
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_token_pair_wire_shape_and_debug() {
        let pair = TokenPair::new("access-abc123", "refresh-xyz789");
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "access-abc123");
        assert_eq!(json["refreshToken"], "refresh-xyz789");

        let rendered = format!("{:?}", pair);
        assert!(!rendered.contains("abc123"));
        assert!(!rendered.contains("xyz789"));
    }
}
