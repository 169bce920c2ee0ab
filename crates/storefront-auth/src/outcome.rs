//! Response classification.
//!
//! Every gateway call ends in exactly one [`GatewayOutcome`]. Callers never
//! look at status codes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::transport::{TransportError, TransportResponse};

/// Shown to users for server and transport failures.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again later.";

/// Classified result of a gateway call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Success { payload: Value },
    ValidationFailure { field: String, message: String },
    Unauthorized,
    ServerError { message: String },
    TransportError { message: String },
}

impl GatewayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GatewayOutcome::Success { .. })
    }

    /// Short tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            GatewayOutcome::Success { .. } => "success",
            GatewayOutcome::ValidationFailure { .. } => "validation_failure",
            GatewayOutcome::Unauthorized => "unauthorized",
            GatewayOutcome::ServerError { .. } => "server_error",
            GatewayOutcome::TransportError { .. } => "transport_error",
        }
    }

    /// Message fit for an end user, or `None` when there is nothing to show.
    ///
    /// Validation messages are verbatim. Server and transport failures get the
    /// generic message.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            GatewayOutcome::ValidationFailure { message, .. } => Some(message),
            GatewayOutcome::ServerError { .. } | GatewayOutcome::TransportError { .. } => {
                Some(GENERIC_FAILURE_MESSAGE)
            }
            GatewayOutcome::Success { .. } | GatewayOutcome::Unauthorized => None,
        }
    }

    /// Decode the success payload. Any other outcome is returned unchanged.
    pub fn into_payload<T: DeserializeOwned>(self) -> Result<T, GatewayOutcome> {
        match self {
            GatewayOutcome::Success { payload } => {
                serde_json::from_value(payload).map_err(|e| GatewayOutcome::ServerError {
                    message: format!("unexpected payload: {}", e),
                })
            }
            other => Err(other),
        }
    }
}

/// Map a transport result onto the outcome taxonomy.
pub fn classify(result: Result<TransportResponse, TransportError>) -> GatewayOutcome {
    let response = match result {
        Ok(response) => response,
        Err(err) => {
            return GatewayOutcome::TransportError {
                message: err.message,
            }
        }
    };

    let body = response.body.as_ref();
    match response.status {
        200..=299 => GatewayOutcome::Success {
            payload: body
                .and_then(|b| b.get("data"))
                .cloned()
                .unwrap_or(Value::Null),
        },
        401 => GatewayOutcome::Unauthorized,
        500 => GatewayOutcome::ServerError {
            message: GENERIC_FAILURE_MESSAGE.to_string(),
        },
        400 => match body.and_then(first_validation_error) {
            Some((field, message)) => GatewayOutcome::ValidationFailure { field, message },
            None => server_error(body),
        },
        _ => server_error(body),
    }
}

fn server_error(body: Option<&Value>) -> GatewayOutcome {
    GatewayOutcome::ServerError {
        message: body_message(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string()),
    }
}

/// Top-level string `message` of an envelope.
pub(crate) fn body_message(body: Option<&Value>) -> Option<String> {
    body?
        .get("message")?
        .as_str()
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// First field and its first message from `errors`, in document order.
///
/// A field whose value is a bare string counts as a one-message list.
pub(crate) fn first_validation_error(body: &Value) -> Option<(String, String)> {
    let errors = body.get("errors")?.as_object()?;
    errors.iter().find_map(|(field, messages)| {
        let message = match messages {
            Value::Array(list) => list.iter().find_map(Value::as_str),
            Value::String(single) => Some(single.as_str()),
            _ => None,
        }?;
        Some((field.clone(), message.to_string()))
    })
}

/// Reason attached to a rejected sign-in: the body message, then the first
/// validation message, then the status.
pub(crate) fn rejection_reason(response: &TransportResponse) -> String {
    let body = response.body.as_ref();
    body_message(body)
        .or_else(|| body.and_then(first_validation_error).map(|(_, m)| m))
        .unwrap_or_else(|| format!("HTTP {}", response.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn response(status: u16, body: Value) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse::new(status, Some(body)))
    }

    #[test]
    fn test_success_extracts_data() {
        let outcome = classify(response(200, json!({"success": true, "data": {"id": 7}})));
        assert_eq!(outcome, GatewayOutcome::Success { payload: json!({"id": 7}) });
    }

    #[test]
    fn test_success_without_data_is_null() {
        let outcome = classify(Ok(TransportResponse::new(204, None)));
        assert_eq!(outcome, GatewayOutcome::Success { payload: Value::Null });
    }

    #[test]
    fn test_unauthorized() {
        assert_eq!(
            classify(response(401, json!({"message": "token expired"}))),
            GatewayOutcome::Unauthorized
        );
    }

    #[test]
    fn test_500_never_leaks_body() {
        let outcome = classify(response(500, json!({"message": "NullPointerException at Foo.java:12"})));
        assert_eq!(
            outcome,
            GatewayOutcome::ServerError {
                message: GENERIC_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_first_validation_error_wins() {
        let outcome = classify(response(
            400,
            json!({
                "success": false,
                "errors": {"email": ["must not be empty"], "password": ["too short"]}
            }),
        ));
        assert_eq!(
            outcome,
            GatewayOutcome::ValidationFailure {
                field: "email".to_string(),
                message: "must not be empty".to_string()
            }
        );
    }

    #[test]
    fn test_validation_order_follows_document() {
        let body: Value =
            serde_json::from_str(r#"{"errors": {"zip": ["invalid"], "city": ["required"]}}"#).unwrap();
        let outcome = classify(Ok(TransportResponse::new(400, Some(body))));
        assert!(matches!(
            outcome,
            GatewayOutcome::ValidationFailure { field, .. } if field == "zip"
        ));
    }

    #[test]
    fn test_400_without_errors_uses_message() {
        assert_eq!(
            classify(response(400, json!({"message": "Cart is empty"}))),
            GatewayOutcome::ServerError {
                message: "Cart is empty".to_string()
            }
        );
        assert_eq!(
            classify(response(400, json!({"errors": {}}))),
            GatewayOutcome::ServerError {
                message: GENERIC_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_other_status_message_or_generic() {
        assert_eq!(
            classify(response(404, json!({"message": "Product not found"}))),
            GatewayOutcome::ServerError {
                message: "Product not found".to_string()
            }
        );
        assert_eq!(
            classify(Ok(TransportResponse::new(503, None))),
            GatewayOutcome::ServerError {
                message: GENERIC_FAILURE_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_no_response_is_transport_error() {
        let outcome = classify(Err(TransportError::timeout("operation timed out")));
        assert_eq!(
            outcome,
            GatewayOutcome::TransportError {
                message: "operation timed out".to_string()
            }
        );
        assert_eq!(outcome.user_message(), Some(GENERIC_FAILURE_MESSAGE));
    }

    #[test]
    fn test_rejection_reason_precedence() {
        let with_message = TransportResponse::new(
            403,
            Some(json!({"message": "Account is locked", "errors": {"u": ["x"]}})),
        );
        assert_eq!(rejection_reason(&with_message), "Account is locked");

        let with_errors = TransportResponse::new(400, Some(json!({"errors": {"username": ["unknown user"]}})));
        assert_eq!(rejection_reason(&with_errors), "unknown user");

        assert_eq!(rejection_reason(&TransportResponse::new(502, None)), "HTTP 502");
    }

    #[test]
    fn test_into_payload() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Product {
            id: u32,
        }

        let ok = GatewayOutcome::Success { payload: json!({"id": 3}) };
        assert_eq!(ok.into_payload::<Product>().unwrap(), Product { id: 3 });

        let unauthorized = GatewayOutcome::Unauthorized.into_payload::<Product>();
        assert_eq!(unauthorized, Err(GatewayOutcome::Unauthorized));
    }

    #[test]
    fn test_user_message() {
        let validation = GatewayOutcome::ValidationFailure {
            field: "email".to_string(),
            message: "must not be empty".to_string(),
        };
        assert_eq!(validation.user_message(), Some("must not be empty"));
        assert_eq!(GatewayOutcome::Unauthorized.user_message(), None);
    }
}
