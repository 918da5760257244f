//! Shared building blocks for the wsrpc workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): types every other crate leans on
//! - **wsrpc-core**: envelope codec, correlation, routing and the session
//! - **wsrpc**: binary wiring logging, config and a WebSocket session together

pub mod error;

pub use error::error_location::ErrorLocation;
