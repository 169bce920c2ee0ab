//! Outbound API gateway.
//!
//! Every domain call goes through [`GatewayClient::request`], which attaches
//! the bearer token, sends the call and classifies the response.

use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use storefront_config::Config;
use tracing::{debug, info, warn};

use crate::error::AuthError;
use crate::outcome::{classify, GatewayOutcome, GENERIC_FAILURE_MESSAGE};
use crate::session::SessionManager;
use crate::transport::{RequestBody, Transport, TransportRequest};

/// Client for the storefront backend API.
#[derive(Clone)]
pub struct GatewayClient {
    session: SessionManager,
    transport: Arc<dyn Transport>,
}

impl GatewayClient {
    /// Gateway sharing the session manager's transport and base URL.
    pub fn new(session: SessionManager) -> Self {
        let transport = session.transport().clone();
        Self { session, transport }
    }

    /// Session manager and gateway over a reqwest transport.
    pub fn from_config(config: &Config) -> crate::AuthResult<Self> {
        Ok(Self::new(SessionManager::from_config(config)?))
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Perform one call against `action`, relative to the API base URL.
    pub async fn request(
        &self,
        action: &str,
        method: Method,
        body: Option<RequestBody>,
    ) -> GatewayOutcome {
        let bearer = match self.session.get_valid_access_token().await {
            Ok(token) => token,
            Err(err) => return token_failure(action, err),
        };

        let url = match self.session.base_url().join(action.trim_start_matches('/')) {
            Ok(url) => url,
            Err(e) => {
                return GatewayOutcome::TransportError {
                    message: format!("invalid action '{}': {}", action, e),
                }
            }
        };

        let mut request = TransportRequest::new(method, url);
        if let Some(token) = bearer {
            request = request.with_bearer(token);
        }
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let request_id = request.request_id;
        let method = request.method.clone();
        let authenticated = request.bearer.is_some();
        debug!(%request_id, %method, action, authenticated, "Sending request");

        let started = Instant::now();
        let result = self.transport.send(request).await;
        let status = result.as_ref().ok().map(|r| r.status);
        let outcome = classify(result);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if outcome.is_success() {
            info!(%request_id, %method, action, status, elapsed_ms, outcome = outcome.tag(), "Request completed");
        } else {
            warn!(%request_id, %method, action, status, elapsed_ms, outcome = outcome.tag(), "Request failed");
        }

        outcome
    }

    pub async fn get(&self, action: &str) -> GatewayOutcome {
        self.request(action, Method::GET, None).await
    }

    pub async fn delete(&self, action: &str) -> GatewayOutcome {
        self.request(action, Method::DELETE, None).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, action: &str, body: &T) -> GatewayOutcome {
        self.send_json(action, Method::POST, body).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, action: &str, body: &T) -> GatewayOutcome {
        self.send_json(action, Method::PUT, body).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, action: &str, body: &T) -> GatewayOutcome {
        self.send_json(action, Method::PATCH, body).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        action: &str,
        method: Method,
        body: &T,
    ) -> GatewayOutcome {
        match serde_json::to_value(body) {
            Ok(value) => self.request(action, method, Some(RequestBody::Json(value))).await,
            Err(e) => GatewayOutcome::TransportError {
                message: format!("unserializable body: {}", e),
            },
        }
    }
}

/// Outcome for a call abandoned before sending because no token could be had.
fn token_failure(action: &str, err: AuthError) -> GatewayOutcome {
    match err {
        AuthError::RefreshFailed(_) => {
            warn!(action, error = %err, "No usable session, not sending");
            GatewayOutcome::Unauthorized
        }
        err => {
            warn!(action, error = %err, "Could not obtain access token");
            GatewayOutcome::TransportError {
                message: GENERIC_FAILURE_MESSAGE.to_string(),
            }
        }
    }
}
