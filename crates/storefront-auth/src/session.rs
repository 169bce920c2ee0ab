//! Session lifecycle with single-flight token refresh.
//!
//! `SessionManager` owns the session store and a rust-fsm machine tracking
//! where the session is in its lifecycle. The access token is refreshed
//! proactively once it enters the lead window before expiry. Refresh tokens
//! rotate on use, so at most one refresh may be in flight: concurrent callers
//! await the same shared future and all see the same result.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use storefront_config::{AuthRoutes, Config};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth_fsm::{
    AuthState, AuthStateChanged, SessionMachine, SessionMachineInput, SessionMachineState,
};
use crate::claims;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::identity::{normalize, ExchangeRequest, RawProfile};
use crate::outcome::rejection_reason;
use crate::store::{Session, SessionStore, SessionView, TokenPair};
use crate::transport::{
    ReqwestTransport, RequestBody, Transport, TransportRequest, TransportResponse,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why the manager last dropped to `Unauthenticated` on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionFailure {
    RefreshFailed { reason: String },
}

/// Point-in-time status of the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<SessionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<SessionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Failure shared by every waiter on one refresh.
#[derive(Debug, Clone)]
struct RefreshFailure {
    reason: String,
}

impl RefreshFailure {
    fn session_ended() -> Self {
        Self {
            reason: "session ended during refresh".to_string(),
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

struct InFlight {
    epoch: u64,
    refresh: SharedRefresh,
}

/// Everything that changes together. Never held across an await.
struct Lifecycle {
    fsm: SessionMachine,
    inflight: Option<InFlight>,
    /// Bumped by sign-out so late completions can tell they are stale.
    epoch: u64,
    last_failure: Option<SessionFailure>,
}

/// Backend half of token exchanges. The refresh future owns one of these
/// plus a `Weak<Inner>`, so a refresh nobody awaits any more cannot keep the
/// manager alive.
struct TokenEndpoint {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    base_url: Url,
    routes: AuthRoutes,
}

struct Inner {
    store: SessionStore,
    lifecycle: Mutex<Lifecycle>,
    endpoint: Arc<TokenEndpoint>,
    lead_window: Duration,
    events: broadcast::Sender<AuthStateChanged>,
}

/// Owner of the current session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    data: Option<TokenPair>,
}

impl SessionManager {
    /// Create a session manager talking to the backend through `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> AuthResult<Self> {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    /// Create a session manager with a custom clock.
    pub fn with_clock(
        transport: Arc<dyn Transport>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                store: SessionStore::default(),
                lifecycle: Mutex::new(Lifecycle {
                    fsm: SessionMachine::new(),
                    inflight: None,
                    epoch: 0,
                    last_failure: None,
                }),
                endpoint: Arc::new(TokenEndpoint {
                    transport,
                    clock,
                    base_url: config.api_base_url()?,
                    routes: config.routes.clone(),
                }),
                lead_window: config.refresh_lead_window(),
                events,
            }),
        })
    }

    /// Create a session manager using the reqwest transport.
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        let transport = ReqwestTransport::from_config(config)?;
        Self::new(Arc::new(transport), config)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.endpoint.transport
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.inner.endpoint.base_url
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        AuthState::from(self.inner.lifecycle.lock().fsm.state())
    }

    /// Subscribe to state change events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthStateChanged> {
        self.inner.events.subscribe()
    }

    /// Display projection of the current session.
    pub fn project_view(&self) -> Option<SessionView> {
        self.inner.store.get().map(|session| session.identity.view())
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let lifecycle = self.inner.lifecycle.lock();
        let session = self.inner.store.get();
        AuthSnapshot {
            state: AuthState::from(lifecycle.fsm.state()),
            last_failure: lifecycle.last_failure.clone(),
            view: session.as_ref().map(|s| s.identity.view()),
            expires_at: session.as_ref().map(|s| s.identity.expires_at),
        }
    }

    /// Exchange a profile for a session.
    ///
    /// State moves `Unauthenticated -> Authenticating -> Authenticated`, or
    /// back to `Unauthenticated` on any failure. A malformed profile fails
    /// before the state machine is touched.
    pub async fn sign_in(&self, profile: &RawProfile) -> AuthResult<SessionView> {
        let request = normalize(profile)?;
        let source = request.source();

        let epoch = {
            let mut lifecycle = self.inner.lifecycle.lock();
            self.transition(&mut lifecycle, SessionMachineInput::SignInAttempt)?;
            lifecycle.last_failure = None;
            lifecycle.epoch
        };

        info!(source = %source, "Signing in");

        let endpoint = &self.inner.endpoint;
        let route = match &request {
            ExchangeRequest::Credentials { .. } => &endpoint.routes.sign_in,
            ExchangeRequest::External(_) => &endpoint.routes.external_sign_in,
        };
        let result = endpoint.exchange(route, &request).await;

        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.epoch != epoch {
            debug!(source = %source, "Sign-in finished after sign-out, discarding");
            return Err(AuthError::Cancelled);
        }

        match result {
            Ok(session) => {
                let view = session.identity.view();
                self.inner.store.set(session);
                self.transition(&mut lifecycle, SessionMachineInput::SignInSucceeded)?;
                info!(source = %source, user_id = %view.id, "Signed in");
                Ok(view)
            }
            Err(err) => {
                self.transition(&mut lifecycle, SessionMachineInput::SignInFailed)?;
                warn!(source = %source, error = %err, "Sign-in failed");
                Err(err)
            }
        }
    }

    /// Adopt a token pair issued earlier, refreshing it at once if it is
    /// inside the lead window.
    ///
    /// The access token may already be expired. In that case the refresh
    /// either replaces it or clears the session, so an expired token is never
    /// handed out.
    pub async fn resume(&self, tokens: TokenPair) -> AuthResult<SessionView> {
        let identity = claims::decode(tokens.access_token())?;

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if *lifecycle.fsm.state() != SessionMachineState::Unauthenticated {
                return Err(AuthError::InvalidStateTransition(format!(
                    "Cannot resume a session in state {}",
                    AuthState::from(lifecycle.fsm.state())
                )));
            }
            self.inner.store.set(Session { identity, tokens });
            lifecycle.last_failure = None;
            self.transition(&mut lifecycle, SessionMachineInput::SessionRestored)?;
        }

        self.get_valid_access_token().await?;
        self.project_view().ok_or(AuthError::Cancelled)
    }

    /// Access token for an outbound call.
    ///
    /// - `Ok(None)` when there is no session
    /// - the current token when it is outside the lead window
    /// - otherwise the result of the refresh in flight, starting one if needed
    pub async fn get_valid_access_token(&self) -> AuthResult<Option<String>> {
        let refresh = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let joined = lifecycle.inflight.as_ref().map(|inflight| inflight.refresh.clone());
            match joined {
                Some(refresh) => {
                    debug!("Joining refresh in flight");
                    refresh
                }
                None => {
                    let Some(session) = self.inner.store.get() else {
                        return Ok(None);
                    };
                    let now = self.inner.endpoint.clock.now();
                    if !session.identity.refresh_due(now, self.inner.lead_window) {
                        return Ok(Some(session.tokens.access_token().to_string()));
                    }
                    self.start_refresh(&mut lifecycle, session)?
                }
            }
        };

        refresh
            .await
            .map(Some)
            .map_err(|failure| AuthError::RefreshFailed(failure.reason))
    }

    /// Drop the session. Any refresh still running is orphaned and its
    /// result discarded.
    pub fn sign_out(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.epoch += 1;
        lifecycle.inflight = None;
        lifecycle.last_failure = None;
        self.inner.store.clear();
        if let Err(err) = self.transition(&mut lifecycle, SessionMachineInput::SignOut) {
            warn!(error = %err, "Sign-out transition rejected");
        }
        info!("Signed out");
    }

    fn start_refresh(
        &self,
        lifecycle: &mut Lifecycle,
        session: Arc<Session>,
    ) -> AuthResult<SharedRefresh> {
        self.transition(lifecycle, SessionMachineInput::TokenExpiring)?;

        let epoch = lifecycle.epoch;
        let refresh = Self::refresh(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.endpoint),
            epoch,
            session,
        )
        .boxed()
        .shared();
        lifecycle.inflight = Some(InFlight {
            epoch,
            refresh: refresh.clone(),
        });

        info!(epoch, "Refreshing access token");
        Ok(refresh)
    }

    /// One refresh attempt. Completion is applied under the lifecycle lock
    /// before any waiter observes the result.
    ///
    /// If every waiter is cancelled the future simply stops being polled. The
    /// next caller joins it and drives it to completion.
    async fn refresh(
        inner: Weak<Inner>,
        endpoint: Arc<TokenEndpoint>,
        epoch: u64,
        session: Arc<Session>,
    ) -> Result<String, RefreshFailure> {
        let body = json!({
            "accessToken": session.tokens.access_token(),
            "refreshToken": session.tokens.refresh_token(),
        });
        let result = endpoint
            .exchange(&endpoint.routes.refresh, &body)
            .await
            .map_err(|err| err.to_string());

        let Some(inner) = inner.upgrade() else {
            return Err(RefreshFailure::session_ended());
        };
        let manager = SessionManager { inner };
        let mut lifecycle = manager.inner.lifecycle.lock();
        let current = lifecycle
            .inflight
            .as_ref()
            .is_some_and(|inflight| inflight.epoch == epoch);
        if lifecycle.epoch != epoch || !current {
            debug!(epoch, "Refresh finished after sign-out, discarding");
            return Err(RefreshFailure::session_ended());
        }
        lifecycle.inflight = None;

        match result {
            Ok(renewed) => {
                let token = renewed.tokens.access_token().to_string();
                let user_id = renewed.identity.subject.clone();
                manager.inner.store.set(renewed);
                if let Err(err) = manager.transition(&mut lifecycle, SessionMachineInput::RefreshSucceeded) {
                    warn!(error = %err, "Refresh success transition rejected");
                }
                info!(user_id = %user_id, "Access token refreshed");
                Ok(token)
            }
            Err(reason) => {
                manager.inner.store.clear();
                lifecycle.last_failure = Some(SessionFailure::RefreshFailed {
                    reason: reason.clone(),
                });
                if let Err(err) = manager.transition(&mut lifecycle, SessionMachineInput::RefreshFailed) {
                    warn!(error = %err, "Refresh failure transition rejected");
                }
                warn!(reason = %reason, "Token refresh failed, session cleared");
                Err(RefreshFailure { reason })
            }
        }
    }

    /// Apply `input` and broadcast if the state changed.
    fn transition(
        &self,
        lifecycle: &mut Lifecycle,
        input: SessionMachineInput,
    ) -> AuthResult<AuthState> {
        let old_state = AuthState::from(lifecycle.fsm.state());

        lifecycle.fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {}",
                input, old_state
            ))
        })?;

        let new_state = AuthState::from(lifecycle.fsm.state());
        if old_state != new_state {
            debug!(
                old_state = %old_state,
                new_state = %new_state,
                "Session state transition"
            );
            let session = self.inner.store.get();
            // No receivers is fine.
            let _ = self.inner.events.send(AuthStateChanged {
                state: new_state,
                last_failure: lifecycle.last_failure.clone(),
                user_id: session.as_ref().map(|s| s.identity.subject.clone()),
                email: session.as_ref().map(|s| s.identity.email.clone()),
            });
        }

        Ok(new_state)
    }
}

impl TokenEndpoint {
    /// POST `body` to `route` and build a live session from the returned pair.
    async fn exchange<B: Serialize + ?Sized>(&self, route: &str, body: &B) -> AuthResult<Session> {
        let url = self
            .base_url
            .join(route)
            .map_err(storefront_config::CoreError::from)?;
        let body = serde_json::to_value(body)
            .map_err(|e| AuthError::MalformedResponse(format!("unserializable request: {}", e)))?;

        let request = TransportRequest::new(Method::POST, url).with_body(RequestBody::Json(body));
        debug!(request_id = %request.request_id, route, "Token exchange");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| AuthError::Transport(e.message))?;

        let tokens = tokens_from(&response)?;
        let identity = claims::decode(tokens.access_token())?;
        identity.ensure_live(self.clock.now())?;

        Ok(Session { identity, tokens })
    }
}

fn tokens_from(response: &TransportResponse) -> AuthResult<TokenPair> {
    if !response.is_success() {
        return Err(AuthError::ExchangeRejected(rejection_reason(response)));
    }

    let body = response.body.clone().unwrap_or(Value::Null);
    let envelope: TokenEnvelope = serde_json::from_value(body)
        .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;

    envelope
        .data
        .filter(|pair| !pair.access_token().is_empty() && !pair.refresh_token().is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("response carries no token pair".to_string()))
}
