use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Socket-level failures. Surfaced through `SessionObserver::on_error`, never fatal.
#[derive(Debug, Clone, ThisError)]
pub enum TransportError {
    #[error("Invalid Address Error: {message} {location}")]
    InvalidAddress {
        message: String,
        location: ErrorLocation,
    },

    #[error("Connect Error: {message} {location}")]
    Connect {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Receive Error: {message} {location}")]
    Receive {
        message: String,
        location: ErrorLocation,
    },

    #[error("Not Open Error: {message} {location}")]
    NotOpen {
        message: String,
        location: ErrorLocation,
    },

    #[error("Runtime Error: {message} {location}")]
    Runtime {
        message: String,
        location: ErrorLocation,
    },
}
