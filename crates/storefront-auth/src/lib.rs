//! Session lifecycle and outbound gateway for the storefront.
//!
//! This crate provides:
//! - Claims decoding for signed access tokens (no signature verification)
//! - Normalization of password and social provider profiles into one exchange request
//! - An FSM-tracked session manager with single-flight token refresh
//! - A gateway client that attaches bearer credentials and classifies every
//!   response into a [`GatewayOutcome`]

mod auth_fsm;
mod claims;
mod clock;
mod error;
mod gateway;
mod identity;
mod outcome;
mod session;
mod store;
mod transport;

pub use auth_fsm::session_machine;
pub use auth_fsm::{AuthState, AuthStateChanged, SessionMachine, SessionMachineInput, SessionMachineState};
pub use claims::{decode, ClaimSet};
pub use clock::{Clock, SystemClock};
pub use error::{AuthError, AuthResult, DecodeError};
pub use gateway::GatewayClient;
pub use identity::{
    normalize, CredentialsInput, ExchangeRequest, ExternalIdentity, FacebookProfile,
    GoogleProfile, Picture, PictureData, RawProfile, SourceKind,
};
pub use outcome::{classify, GatewayOutcome, GENERIC_FAILURE_MESSAGE};
pub use session::{AuthSnapshot, SessionFailure, SessionManager};
pub use store::{Session, SessionView, TokenPair};
pub use transport::{
    FormPart, RequestBody, ReqwestTransport, Transport, TransportError, TransportRequest,
    TransportResponse, REQUEST_ID_HEADER,
};

pub use reqwest::Method;
