//! # workflow-bridge
//!
//! Exposes a workflow-automation platform's REST API as a set of
//! schema-validated tools, callable over:
//! - a newline-delimited JSON pipe on stdin/stdout (plain or JSON-RPC/MCP),
//! - an HTTP surface (`/tools`, `/call`, `/health`, `/sse`),
//!
//! plus an authenticated administrative API for a management console.
//!
//! ## Architecture
//!
//! ```text
//!   stdio / HTTP ──▶ Dispatcher ──▶ ToolRegistry ──▶ Operation ──▶ WorkflowApi ──▶ remote
//!                        │                                            (RemoteApiClient:
//!                   RateLimiter                                        retry, timeout,
//!                                                                      error taxonomy)
//!   admin HTTP ─────────────────────────────────────────────────────▶ WorkflowApi
//! ```
//!
//! Every tool outcome crosses a transport boundary as a
//! [`envelope::ResultEnvelope`].

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod dispatch;
pub mod envelope;
pub mod rate_limiter;
pub mod selfcheck;
pub mod tools;
pub mod transport;
pub mod types;

// Internal utilities
pub mod observability;

pub use client::{ApiError, RemoteApiClient, WorkflowApi};
pub use dispatch::Dispatcher;
pub use envelope::{ErrorKind, ResultEnvelope};
pub use types::{Config, Error, Result};
