//! Result envelope: the one response shape that crosses a tool boundary.
//!
//! ```text
//! { "success": true,  "data": <any>, "error": null }
//! { "success": false, "data": null,  "error": { "kind": "...", "message": "..." } }
//! ```
//!
//! Construction goes through [`ResultEnvelope::ok`] / [`ResultEnvelope::err`]
//! and deserialization re-checks the shape, so an envelope with both or
//! neither side populated cannot exist.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    AuthenticationError,
    RateLimitError,
    ConnectionError,
    TimeoutError,
    ServerError,
    UnknownError,
}

impl ErrorKind {
    /// Wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AuthenticationError => "authentication_error",
            ErrorKind::RateLimitError => "rate_limit_error",
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure: category plus human message, never a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error ({}): {}", self.kind, self.message)
    }
}

/// Uniform success/failure envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct ResultEnvelope {
    success: bool,
    data: Option<Value>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

impl TryFrom<RawEnvelope> for ResultEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.success, raw.error) {
            (true, None) => Ok(Self::ok(raw.data.unwrap_or(Value::Null))),
            (true, Some(_)) => Err("successful envelope must not carry an error".to_string()),
            (false, Some(error)) => match raw.data {
                None | Some(Value::Null) => Ok(Self {
                    success: false,
                    data: None,
                    error: Some(error),
                }),
                Some(_) => Err("failed envelope must not carry data".to_string()),
            },
            (false, None) => Err("failed envelope must carry an error".to_string()),
        }
    }
}

impl ResultEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::err(ErrorKind::ValidationError, message)
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self::err(ErrorKind::NotFound, format!("tool '{name}' not found"))
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        self.error.as_ref()
    }

    /// Failure kind, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn into_result(self) -> Result<Value, ErrorBody> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }

    /// JSON value in the HTTP wire shape.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "success": self.success,
            "data": self.data,
            "error": self.error,
        })
    }
}

impl From<Result<Value, ErrorBody>> for ResultEnvelope {
    fn from(result: Result<Value, ErrorBody>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::err(error.kind, error.message),
        }
    }
}
