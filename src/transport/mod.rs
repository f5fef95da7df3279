//! Transports: the pipe protocol, the HTTP tool surface and the admin API.
//!
//! The first two feed [`crate::dispatch::Dispatcher`]; the admin surface talks
//! to the remote platform directly.

pub mod admin;
pub mod http;
pub mod stdio;

pub use stdio::StdioServer;
