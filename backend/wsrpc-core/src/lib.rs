//! Bidirectional RPC over a message-oriented socket.
//!
//! A [`Session`] opens a transport, sends invocations to the peer and routes the
//! peer's invocations to handlers registered on an [`InvocationRouter`].
//! Replies are matched to callers through the [`CorrelationTable`].

pub mod config;
pub mod correlation;
pub mod dispatch_context;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod router;
pub mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::SessionConfig;
pub use correlation::CorrelationTable;
pub use dispatch_context::{DispatchContext, InlineDispatch, WorkerDispatch};
pub use envelope::{
    Arguments, Envelope, IntoArguments, InvocationDescriptor, InvocationResult, MessageKind,
    Payload, RpcType, RpcValue, SENTINEL_IDENTIFIER, TypedValue,
};
pub use error::{CoreError, RpcError, TransportError};
pub use router::{InvocationRouter, RouteOutcome};
pub use session::{
    Lifecycle, NoopObserver, PendingResult, Session, SessionBuilder, SessionObserver, WeakSession,
};
pub use transport::WsConnector;
