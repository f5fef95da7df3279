//! Remote platform error taxonomy.
//!
//! Every failed outbound call ends up as exactly one [`ApiError`]. Status
//! codes are classified once here; the retry policy and the envelope layer
//! only ever look at [`ApiErrorKind`].

use std::fmt;
use thiserror::Error;

use crate::envelope::{ErrorKind, ResultEnvelope};

/// Discriminant of [`ApiError`], used for retry decisions and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    Connection,
    Timeout,
    Authentication,
    NotFound,
    RateLimit,
    Server,
    Validation,
    Unknown,
}

impl ApiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiErrorKind::Connection => "connection",
            ApiErrorKind::Timeout => "timeout",
            ApiErrorKind::Authentication => "authentication",
            ApiErrorKind::NotFound => "not_found",
            ApiErrorKind::RateLimit => "rate_limit",
            ApiErrorKind::Server => "server",
            ApiErrorKind::Validation => "validation",
            ApiErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ApiErrorKind> for ErrorKind {
    fn from(kind: ApiErrorKind) -> Self {
        match kind {
            ApiErrorKind::Connection => ErrorKind::ConnectionError,
            ApiErrorKind::Timeout => ErrorKind::TimeoutError,
            ApiErrorKind::Authentication => ErrorKind::AuthenticationError,
            ApiErrorKind::NotFound => ErrorKind::NotFound,
            ApiErrorKind::RateLimit => ErrorKind::RateLimitError,
            ApiErrorKind::Server => ErrorKind::ServerError,
            ApiErrorKind::Validation => ErrorKind::ValidationError,
            ApiErrorKind::Unknown => ErrorKind::UnknownError,
        }
    }
}

/// A failed call to the remote platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network-level failure before a response arrived.
    #[error("failed to connect to remote platform: {message}")]
    Connection { message: String },

    /// The per-request timeout elapsed.
    #[error("remote request timed out: {message}")]
    Timeout { message: String },

    /// 401 or 403.
    #[error("authentication failed ({status}): {message}")]
    Authentication { status: u16, message: String },

    /// 404.
    #[error("resource not found: {message}")]
    NotFound { message: String },

    /// 429.
    #[error("rate limited by remote platform: {message}")]
    RateLimit { message: String },

    /// 5xx.
    #[error("remote server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other 4xx.
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// Anything that fits nowhere else (undecodable body, unexpected status).
    #[error("unexpected remote error: {message}")]
    Unknown { status: Option<u16>, message: String },
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ApiError::Authentication { status, message },
            404 => ApiError::NotFound { message },
            429 => ApiError::RateLimit { message },
            500..=599 => ApiError::Server { status, message },
            400..=499 => ApiError::Validation { status, message },
            _ => ApiError::Unknown {
                status: Some(status),
                message,
            },
        }
    }

    /// Classify a transport failure reported by the HTTP client.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            ApiError::Timeout { message }
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ApiError::Connection { message }
        } else {
            ApiError::Unknown {
                status: err.status().map(|s| s.as_u16()),
                message,
            }
        }
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Connection { .. } => ApiErrorKind::Connection,
            ApiError::Timeout { .. } => ApiErrorKind::Timeout,
            ApiError::Authentication { .. } => ApiErrorKind::Authentication,
            ApiError::NotFound { .. } => ApiErrorKind::NotFound,
            ApiError::RateLimit { .. } => ApiErrorKind::RateLimit,
            ApiError::Server { .. } => ApiErrorKind::Server,
            ApiError::Validation { .. } => ApiErrorKind::Validation,
            ApiError::Unknown { .. } => ApiErrorKind::Unknown,
        }
    }

    /// HTTP status observed, if a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Connection { .. } | ApiError::Timeout { .. } => None,
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimit { .. } => Some(429),
            ApiError::Authentication { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Validation { status, .. } => Some(*status),
            ApiError::Unknown { status, .. } => *status,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Connection { message }
            | ApiError::Timeout { message }
            | ApiError::Authentication { message, .. }
            | ApiError::NotFound { message }
            | ApiError::RateLimit { message }
            | ApiError::Server { message, .. }
            | ApiError::Validation { message, .. }
            | ApiError::Unknown { message, .. } => message,
        }
    }
}

impl From<ApiError> for ResultEnvelope {
    fn from(err: ApiError) -> Self {
        ResultEnvelope::err(err.kind().into(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiError::from_status(401, "x").kind(), ApiErrorKind::Authentication);
        assert_eq!(ApiError::from_status(403, "x").kind(), ApiErrorKind::Authentication);
        assert_eq!(ApiError::from_status(404, "x").kind(), ApiErrorKind::NotFound);
        assert_eq!(ApiError::from_status(429, "x").kind(), ApiErrorKind::RateLimit);
        assert_eq!(ApiError::from_status(500, "x").kind(), ApiErrorKind::Server);
        assert_eq!(ApiError::from_status(503, "x").kind(), ApiErrorKind::Server);
        assert_eq!(ApiError::from_status(400, "x").kind(), ApiErrorKind::Validation);
        assert_eq!(ApiError::from_status(422, "x").kind(), ApiErrorKind::Validation);
        assert_eq!(ApiError::from_status(302, "x").kind(), ApiErrorKind::Unknown);
    }

    #[test]
    fn test_status_carried() {
        assert_eq!(ApiError::from_status(403, "nope").status(), Some(403));
        assert_eq!(ApiError::from_status(502, "bad gateway").status(), Some(502));
        assert_eq!(
            ApiError::Connection {
                message: "refused".into()
            }
            .status(),
            None
        );
    }

    #[test]
    fn test_envelope_conversion() {
        let env: ResultEnvelope = ApiError::from_status(404, "Workflow not found").into();
        assert!(!env.is_success());
        let error = env.error().unwrap();
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(error.message, "resource not found: Workflow not found");
    }
}
