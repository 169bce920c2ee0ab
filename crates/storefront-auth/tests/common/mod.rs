//! Shared fixtures for storefront-auth integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use storefront_auth::{
    Clock, SessionManager, Transport, TransportError, TransportRequest, TransportResponse,
};
use storefront_config::Config;
use tokio::sync::Semaphore;

pub type Reply = Result<TransportResponse, TransportError>;

/// Unsigned compact token carrying the given subject and expiry.
pub fn token(sub: &str, exp: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "sub": sub,
        "email": format!("{}@shop.test", sub),
        "name": "Nguyen Van A",
        "role": "customer",
        "exp": exp.timestamp(),
    });
    format!(
        "{}.{}.c2lnbmF0dXJl",
        header,
        URL_SAFE_NO_PAD.encode(payload.to_string())
    )
}

pub fn issued(access: &str, refresh: &str) -> Reply {
    Ok(TransportResponse::new(
        200,
        Some(json!({
            "success": true,
            "data": {"accessToken": access, "refreshToken": refresh}
        })),
    ))
}

pub fn status(code: u16, body: Value) -> Reply {
    Ok(TransportResponse::new(code, Some(body)))
}

/// Clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Backend double routed by path relative to `/api/`.
///
/// Each route replays its queued replies; the last one repeats. Routes marked
/// with [`MockBackend::hold`] block until [`MockBackend::release`] is called.
pub struct MockBackend {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<TransportRequest>>,
    held: Mutex<HashSet<String>>,
    gate: Semaphore,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::default(),
            calls: Mutex::default(),
            held: Mutex::default(),
            gate: Semaphore::new(0),
        })
    }

    pub fn on(&self, route: &str, reply: Reply) {
        self.replies
            .lock()
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn hold(&self, route: &str) {
        self.held.lock().insert(route.to_string());
    }

    pub fn release(&self, calls: usize) {
        self.gate.add_permits(calls);
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, route: &str) -> Vec<TransportRequest> {
        self.calls()
            .into_iter()
            .filter(|request| route_of(request) == route)
            .collect()
    }

    /// Wait until `route` has been called `count` times.
    pub async fn wait_for_calls(&self, route: &str, count: usize) {
        for _ in 0..200 {
            if self.calls_to(route).len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {} call(s) to {}", count, route);
    }

    fn next_reply(&self, route: &str) -> Reply {
        let mut replies = self.replies.lock();
        match replies.get_mut(route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => status(404, json!({"success": false, "message": "Not found"})),
        }
    }
}

fn route_of(request: &TransportRequest) -> String {
    request.url.path().trim_start_matches("/api/").to_string()
}

#[async_trait]
impl Transport for MockBackend {
    async fn send(&self, request: TransportRequest) -> Reply {
        let route = route_of(&request);
        self.calls.lock().push(request);

        let held = self.held.lock().contains(&route);
        if held {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        self.next_reply(&route)
    }
}

/// Session manager over `backend` with the default 30s lead window.
pub fn manager(backend: Arc<MockBackend>, clock: Arc<FixedClock>) -> SessionManager {
    SessionManager::with_clock(backend, &Config::default(), clock).unwrap()
}
