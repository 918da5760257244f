use crate::error::transport::TransportError;
use crate::session::Session;

/// Lifecycle and message callbacks supplied by the application.
///
/// Every method runs inside the dispatch context and defaults to doing nothing.
/// The session is passed in so a callback can invoke the peer or reconnect
/// (e.g. [`Session::start`] from `on_close`).
pub trait SessionObserver: Send + Sync + 'static {
    fn on_open(&self, _session: &Session) {}

    fn on_connected(&self, _session: &Session, _connection_id: &str) {}

    fn on_text_message(&self, _session: &Session, _text: &str) {}

    fn on_close(&self, _session: &Session, _code: u16, _reason: &str, _was_clean: bool) {}

    fn on_error(&self, _session: &Session, _error: &TransportError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
