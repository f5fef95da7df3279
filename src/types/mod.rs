//! Core types for the bridge.
//!
//! - **Errors**: Application error type with thiserror derives
//! - **Config**: Configuration structures for the remote client, listeners,
//!   logging and rate limiting

mod config;
mod errors;

pub use config::{
    Config, LogFormat, ObservabilityConfig, PortalConfig, RateLimitSettings, RemoteConfig,
    ServerConfig, ServerMode,
};
pub use errors::{Error, Result};
