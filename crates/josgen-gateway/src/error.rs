//! Error normalization
//!
//! Every terminal failure, whatever its shape (no response, non-2xx with a
//! `message`, 422 with a field map, bare status code), becomes one `Error`
//! whose `Display` is the message shown to the user. Precedence:
//!
//! 1. A non-empty `message` string in the response body, verbatim
//! 2. Fixed defaults for 401/403/404/422/500 (422 first looks at `errors`)
//! 3. No response at all: connectivity message
//! 4. Anything else: the underlying error's message, or a generic fallback

use reqwest::StatusCode;
use serde_json::Value;

pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required. Please log in again.";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const VALIDATION_MESSAGE: &str = "The submitted data is invalid.";
pub const SERVER_MESSAGE: &str = "A server error occurred. Please try again later.";
pub const NETWORK_MESSAGE: &str = "Unable to reach the server. Please check your connection.";
pub const BUSINESS_MESSAGE: &str = "The request could not be completed.";
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred.";

/// Normalized API failure.
///
/// Variants follow the failure taxonomy so callers can branch on kind, but
/// `Display` is always just the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 401, either not refreshable or still rejected after a refresh
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// 422; `field` names the first entry of the `errors` map, if any
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("{0}")]
    Server(String),

    /// Any other non-2xx status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// No response received (connect failure, timeout)
    #[error("{0}")]
    Network(String),

    /// 2xx transport but the envelope's success flag is false or missing
    #[error("{0}")]
    Business(String),

    /// 2xx response whose body could not be read as expected
    #[error("{0}")]
    Decode(String),

    /// The request could not be built
    #[error("{0}")]
    Request(String),

    /// Transport failure that is neither connectivity nor a bad request,
    /// e.g. a redirect loop or a body cut off mid-read
    #[error("{0}")]
    Unexpected(String),
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized(_) => Some(401),
            Error::Forbidden(_) => Some(403),
            Error::NotFound(_) => Some(404),
            Error::Validation { .. } => Some(422),
            Error::Server(_) => Some(500),
            Error::Status { status, .. } => Some(*status),
            Error::Network(_)
            | Error::Business(_)
            | Error::Decode(_)
            | Error::Request(_)
            | Error::Unexpected(_) => None,
        }
    }

    /// Normalize a non-2xx response.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let json: Option<Value> = serde_json::from_slice(body).ok();
        let explicit = json.as_ref().and_then(body_message);

        match status.as_u16() {
            401 => Error::Unauthorized(explicit.unwrap_or_else(|| UNAUTHORIZED_MESSAGE.into())),
            403 => Error::Forbidden(explicit.unwrap_or_else(|| FORBIDDEN_MESSAGE.into())),
            404 => Error::NotFound(explicit.unwrap_or_else(|| NOT_FOUND_MESSAGE.into())),
            422 => {
                let (field, first) = match json.as_ref().and_then(first_validation_error) {
                    Some((field, message)) => (Some(field), message),
                    None => (None, None),
                };
                let message = explicit
                    .or(first)
                    .unwrap_or_else(|| VALIDATION_MESSAGE.into());
                Error::Validation { message, field }
            }
            500 => Error::Server(explicit.unwrap_or_else(|| SERVER_MESSAGE.into())),
            other => Error::Status {
                status: other,
                message: explicit
                    .unwrap_or_else(|| format!("Request failed with status code {other}")),
            },
        }
    }

    /// Normalize a transport failure from reqwest.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return Error::Request(format!("invalid request: {err}"));
        }
        if err.is_decode() {
            return Error::Decode(format!("invalid response body: {err}"));
        }
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return Error::Network(NETWORK_MESSAGE.into());
        }
        Error::unexpected(&err.to_string())
    }

    /// The underlying message, or the generic fallback when it is blank.
    pub fn unexpected(message: &str) -> Self {
        if message.trim().is_empty() {
            Error::Unexpected(FALLBACK_MESSAGE.into())
        } else {
            Error::Unexpected(message.to_string())
        }
    }
}

/// Non-empty `message` string from a response body.
pub(crate) fn body_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}

/// First field and its first message from a Laravel-style `errors` map.
///
/// Field values may be a list of messages or a single string.
fn first_validation_error(body: &Value) -> Option<(String, Option<String>)> {
    let (field, messages) = body.get("errors")?.as_object()?.iter().next()?;
    let message = match messages {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(Value::as_str).map(str::to_string),
        _ => None,
    };
    Some((field.clone(), message))
}
