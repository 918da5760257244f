//! Two-level wire format.
//!
//! Every frame is an [`Envelope`] whose `kind` decides how `payload` is read:
//!
//! - `ConnectionEvent`: the connection id assigned by the peer, verbatim
//! - `Text`: a plain string, verbatim
//! - `Invocation`: a JSON-encoded [`InvocationDescriptor`]
//! - `InvocationResult`: a JSON-encoded [`InvocationResult`]
//!
//! Everything here is a pure transformation.

mod value;

pub use value::{Arguments, IntoArguments, IntoReturn, RpcType, RpcValue, TypedValue};

use crate::error::envelope::EnvelopeError;
use crate::error::rpc::RpcError;

use common::ErrorLocation;

use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Identifier reserved for fire-and-forget invocations. Shared by both peers
/// and never produced by the identifier generator.
pub const SENTINEL_IDENTIFIER: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    ConnectionEvent,
    Text,
    Invocation,
    InvocationResult,
}

/// Outer frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: MessageKind,
    pub payload: String,
}

/// A request naming a method and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationDescriptor {
    pub method_name: String,
    pub arguments: Arguments,
    pub identifier: String,
}

impl InvocationDescriptor {
    pub fn new(
        method_name: impl Into<String>,
        arguments: Arguments,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            arguments,
            identifier: identifier.into(),
        }
    }

    /// True when the caller does not expect a reply.
    pub fn is_fire_and_forget(&self) -> bool {
        self.identifier == SENTINEL_IDENTIFIER
    }
}

/// Reply to an invocation. Exactly one of `result` / `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub identifier: String,
    pub result: Option<TypedValue>,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn success(identifier: impl Into<String>, value: TypedValue) -> Self {
        Self {
            identifier: identifier.into(),
            result: Some(value),
            error: None,
        }
    }

    pub fn failure(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            result: None,
            error: Some(message.into()),
        }
    }

    /// Converts the reply into what a waiting caller receives.
    ///
    /// An error string wins over a result; neither present is [`RpcError::NoResult`].
    #[track_caller]
    pub fn into_outcome(self) -> Result<TypedValue, RpcError> {
        match (self.result, self.error) {
            (_, Some(message)) => Err(RpcError::Remote {
                message,
                location: ErrorLocation::from(Location::caller()),
            }),
            (Some(value), None) => Ok(value),
            (None, None) => Err(RpcError::NoResult {
                identifier: self.identifier,
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// Decoded payload, one variant per [`MessageKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    ConnectionEvent(String),
    Text(String),
    Invocation(InvocationDescriptor),
    InvocationResult(InvocationResult),
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::ConnectionEvent(_) => MessageKind::ConnectionEvent,
            Payload::Text(_) => MessageKind::Text,
            Payload::Invocation(_) => MessageKind::Invocation,
            Payload::InvocationResult(_) => MessageKind::InvocationResult,
        }
    }
}

impl Envelope {
    /// Wraps a typed payload into an envelope of the matching kind.
    #[track_caller]
    pub fn encode(payload: &Payload) -> Result<Self, EnvelopeError> {
        let payload_text = match payload {
            Payload::ConnectionEvent(text) | Payload::Text(text) => text.clone(),
            Payload::Invocation(descriptor) => to_json(descriptor)?,
            Payload::InvocationResult(result) => to_json(result)?,
        };

        Ok(Self {
            kind: payload.kind(),
            payload: payload_text,
        })
    }

    /// Parses an inbound frame into an envelope without touching the payload.
    #[track_caller]
    pub fn decode(frame: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(frame).map_err(|e| EnvelopeError::MalformedEnvelope {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Reads the payload in the shape implied by `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MalformedPayload`] if the payload does not match
    /// that shape, or if a connection event carries an empty id.
    #[track_caller]
    pub fn decode_payload(&self) -> Result<Payload, EnvelopeError> {
        let malformed = |message: String| EnvelopeError::MalformedPayload {
            kind: self.kind,
            message,
            location: ErrorLocation::from(Location::caller()),
        };

        match self.kind {
            MessageKind::ConnectionEvent => {
                if self.payload.is_empty() {
                    return Err(malformed("connection id is empty".to_string()));
                }
                Ok(Payload::ConnectionEvent(self.payload.clone()))
            }
            MessageKind::Text => Ok(Payload::Text(self.payload.clone())),
            MessageKind::Invocation => serde_json::from_str(&self.payload)
                .map(Payload::Invocation)
                .map_err(|e| malformed(e.to_string())),
            MessageKind::InvocationResult => serde_json::from_str(&self.payload)
                .map(Payload::InvocationResult)
                .map_err(|e| malformed(e.to_string())),
        }
    }

    /// Serializes the envelope into a text frame.
    #[track_caller]
    pub fn to_frame(&self) -> Result<String, EnvelopeError> {
        to_json(self)
    }
}

#[track_caller]
fn to_json<T: Serialize>(value: &T) -> Result<String, EnvelopeError> {
    serde_json::to_string(value).map_err(|e| EnvelopeError::Encode {
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    })
}
