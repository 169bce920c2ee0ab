//! Session lifecycle state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//!                  ┌───────────────────┐
//!   SignOut ──────►│  Unauthenticated  │ (initial)
//!                  └─────────┬─────────┘
//!                            │ SignInAttempt            SessionRestored
//!                            ▼                                │
//!                  ┌───────────────────┐                      │
//!                  │  Authenticating   │── SignInFailed ──► Unauthenticated
//!                  └─────────┬─────────┘
//!                            │ SignInSucceeded                │
//!                            ▼                                ▼
//!                  ┌───────────────────┐   TokenExpiring   ┌──────────────┐
//!                  │   Authenticated   │ ────────────────► │  Refreshing  │
//!                  └───────────────────┘ ◄──────────────── └──────┬───────┘
//!                                          RefreshSucceeded       │ RefreshFailed
//!                                                                 ▼
//!                                                          Unauthenticated
//! ```
//!
//! `SignOut` is accepted from every state and always lands in
//! `Unauthenticated`.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates `session_machine::{State, Input, StateMachine}`.
state_machine! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub session_machine(Unauthenticated)

    Unauthenticated => {
        SignInAttempt => Authenticating,
        SessionRestored => Authenticated,
        SignOut => Unauthenticated
    },
    Authenticating => {
        SignInSucceeded => Authenticated,
        SignInFailed => Unauthenticated,
        SignOut => Unauthenticated
    },
    Authenticated => {
        TokenExpiring => Refreshing,
        SignOut => Unauthenticated
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshFailed => Unauthenticated,
        SignOut => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session.
    Unauthenticated,
    /// A sign-in exchange is in flight.
    Authenticating,
    /// Holding a usable session.
    Authenticated,
    /// Rotating the token pair.
    Refreshing,
}

impl AuthState {
    /// Returns true while a session is held, including during a refresh.
    pub fn has_session(&self) -> bool {
        matches!(self, AuthState::Authenticated | AuthState::Refreshing)
    }

    /// Returns true if the state is waiting on the backend.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthState::Authenticating | AuthState::Refreshing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "unauthenticated",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
            AuthState::Refreshing => "refreshing",
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Unauthenticated => AuthState::Unauthenticated,
            SessionMachineState::Authenticating => AuthState::Authenticating,
            SessionMachineState::Authenticated => AuthState::Authenticated,
            SessionMachineState::Refreshing => AuthState::Refreshing,
        }
    }
}

/// Broadcast to subscribers on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStateChanged {
    pub state: AuthState,
    /// Set when the change was caused by a terminal failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<crate::SessionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
