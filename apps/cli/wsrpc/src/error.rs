use common::ErrorLocation;

use thiserror::Error;

/// Errors that stop the `wsrpc` binary.
#[derive(Debug, Error)]
pub enum WsrpcError {
    /// Error from this App
    #[error("Wsrpc Error: {message} {location}")]
    Wsrpc {
        message: String,
        location: ErrorLocation,
    },

    /// Config could not be loaded
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Error from wsrpc-core while setting up the session
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}
