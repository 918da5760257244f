use crate::error::envelope::EnvelopeError;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Caller-side failures, delivered through the same channel as results.
///
/// `Clone` so `cancel_all` can fan one error out to every pending caller.
#[derive(Debug, Clone, ThisError)]
pub enum RpcError {
    #[error("Remote Error: {message} {location}")]
    Remote {
        message: String,
        location: ErrorLocation,
    },

    #[error("No Result Error: reply to {identifier} carried neither a result nor an error {location}")]
    NoResult {
        identifier: String,
        location: ErrorLocation,
    },

    #[error("Not Connected Error: transport is not open {location}")]
    NotConnected { location: ErrorLocation },

    #[error("Connection Closed Error: session closed before a reply arrived {location}")]
    ConnectionClosed { location: ErrorLocation },

    #[error("Unknown Correlation Error: no pending invocation for {identifier} {location}")]
    UnknownCorrelation {
        identifier: String,
        location: ErrorLocation,
    },

    #[error("Duplicate Identifier Error: {identifier} is already pending {location}")]
    DuplicateIdentifier {
        identifier: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },

    #[error("Result Type Error: {message} {location}")]
    ResultType {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RpcError {
    #[track_caller]
    pub fn not_connected() -> Self {
        RpcError::NotConnected {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn connection_closed() -> Self {
        RpcError::ConnectionClosed {
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<EnvelopeError> for RpcError {
    #[track_caller]
    fn from(error: EnvelopeError) -> Self {
        RpcError::Encode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
