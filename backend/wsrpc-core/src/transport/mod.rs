//! Transport seam.
//!
//! The session only needs to open a connection, push text frames, close it,
//! and hear about what happened. [`Connector`] opens, [`TransportHandle`] is
//! the open connection, and [`TransportEvent`]s flow back through an
//! [`EventSink`].

mod ws;

pub use ws::WsConnector;

use crate::error::transport::TransportError;

use std::sync::Arc;

use url::Url;

/// Something that happened on the socket.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Open,
    Message(String),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error(TransportError),
}

/// Callback receiving transport events, called from the transport's I/O task.
pub type EventSink = Arc<dyn Fn(TransportEvent) + Send + Sync>;

pub trait Connector: Send + Sync + 'static {
    /// Starts connecting to `url` and returns immediately.
    ///
    /// Connection success is reported as [`TransportEvent::Open`]; failure as
    /// [`TransportEvent::Error`] followed by [`TransportEvent::Close`]. Events
    /// may be reported before `connect` returns.
    fn connect(
        &self,
        url: &Url,
        events: EventSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError>;
}

pub trait TransportHandle: Send + Sync {
    fn send(&self, frame: String) -> Result<(), TransportError>;

    fn close(&self);
}
