//! Application error types.
//!
//! Remote-platform failures have their own taxonomy in
//! [`crate::client::ApiError`]; this enum covers everything else the process
//! can fail on (startup configuration, I/O on the transports, encoding).

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the bridge process.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation errors on caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Local call budget exhausted.
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Internal errors.
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote platform errors surfaced outside a tool boundary.
    #[error(transparent)]
    Remote(#[from] crate::client::ApiError),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Envelope error kind this error is reported as when it reaches a
    /// transport boundary.
    pub fn envelope_kind(&self) -> crate::envelope::ErrorKind {
        use crate::envelope::ErrorKind;
        match self {
            Error::Validation(_) | Error::Serialization(_) => ErrorKind::ValidationError,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::RateLimited(_) => ErrorKind::RateLimitError,
            Error::Remote(e) => e.kind().into(),
            Error::Config(_) | Error::Internal(_) | Error::Io(_) => ErrorKind::UnknownError,
        }
    }
}

impl From<Error> for crate::envelope::ResultEnvelope {
    fn from(err: Error) -> Self {
        match err {
            Error::Remote(e) => e.into(),
            other => {
                let kind = other.envelope_kind();
                let message = match &other {
                    Error::Validation(m)
                    | Error::NotFound(m)
                    | Error::RateLimited(m)
                    | Error::Config(m)
                    | Error::Internal(m) => m.clone(),
                    _ => other.to_string(),
                };
                crate::envelope::ResultEnvelope::err(kind, message)
            }
        }
    }
}
