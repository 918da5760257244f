use crate::envelope::MessageKind;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum EnvelopeError {
    #[error("Malformed Envelope Error: {message} {location}")]
    MalformedEnvelope {
        message: String,
        location: ErrorLocation,
    },

    #[error("Malformed Payload Error: {kind:?} payload: {message} {location}")]
    MalformedPayload {
        kind: MessageKind,
        message: String,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}
