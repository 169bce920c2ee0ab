//! Outbound HTTP seam.
//!
//! The session manager and the gateway both talk to the backend through
//! [`Transport`]. Production uses [`ReqwestTransport`]; tests script their own.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use storefront_config::Config;
use thiserror::Error;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};

/// Header carrying the per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request payload. Only `Json` gets an explicit content type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Binary(Vec<u8>),
    Multipart(Vec<FormPart>),
}

impl RequestBody {
    /// The content type forced on the request, if any.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::Binary(_) | RequestBody::Multipart(_) => None,
        }
    }
}

/// One multipart field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime: None,
            bytes,
        }
    }
}

/// A fully resolved outbound call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Bearer token, if the call is authenticated.
    pub bearer: Option<String>,
    pub body: Option<RequestBody>,
    pub request_id: Uuid,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            bearer: None,
            body: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Any response that made it back, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body. `None` when empty or not JSON.
    pub body: Option<Value>,
}

impl TransportResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No response was received.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::timeout(err.to_string())
        } else {
            TransportError::new(err.to_string())
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with a per-call timeout.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> AuthResult<Self> {
        Self::new(config.request_timeout())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .header(REQUEST_ID_HEADER, request.request_id.to_string());

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Binary(bytes)) => builder.body(bytes),
            Some(RequestBody::Multipart(parts)) => builder.multipart(build_form(parts)?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(status, error = %e, "Response body is not JSON");
                    None
                }
            }
        };

        Ok(TransportResponse { status, body })
    }
}

fn build_form(parts: Vec<FormPart>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => {
                let mut file = Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = mime {
                    file = file
                        .mime_str(&mime)
                        .map_err(|e| TransportError::new(format!("invalid mime type: {}", e)))?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}
