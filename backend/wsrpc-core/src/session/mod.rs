//! Client session: transport ownership, lifecycle and outbound invocations.
//!
//! # Threading
//!
//! - Transport events are marshaled onto the [`DispatchContext`] before any
//!   session or dispatcher logic runs.
//! - `invoke` / `invoke_only` may be called from any thread.
//! - Lifecycle and transport handle share one mutex so `start`, `close` and
//!   event handling observe consistent state.
//! - The mutex is never held while calling the connector, a transport
//!   handle or the observer, so a transport may report events synchronously.
//! - Each `start` bumps a generation counter; events from a superseded
//!   transport are ignored.
//!
//! # Calling back into the session
//!
//! Observer callbacks receive the [`Session`]. Handlers registered through
//! [`SessionBuilder::with_handlers`] get a [`WeakSession`], which does not keep
//! the session alive.

mod observer;
mod pending;

pub use observer::{NoopObserver, SessionObserver};
pub use pending::PendingResult;

use crate::config::{SessionConfig, parse_ws_url};
use crate::correlation::CorrelationTable;
use crate::dispatch_context::{DispatchContext, InlineDispatch};
use crate::dispatcher::{Dispatcher, SessionLink};
use crate::envelope::{
    Envelope, IntoArguments, InvocationDescriptor, Payload, SENTINEL_IDENTIFIER,
};
use crate::error::rpc::RpcError;
use crate::error::transport::TransportError;
use crate::router::InvocationRouter;
use crate::transport::{Connector, EventSink, TransportEvent, TransportHandle, WsConnector};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use log::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Connecting,
    Open,
    Closed,
}

/// Builder for [`Session`].
///
/// Defaults: no handlers, [`NoopObserver`], [`WsConnector`], [`InlineDispatch`].
pub struct SessionBuilder {
    url: String,
    log_frames: bool,
    router: InvocationRouter,
    handlers: Option<Box<dyn FnOnce(WeakSession, &mut InvocationRouter)>>,
    observer: Arc<dyn SessionObserver>,
    connector: Arc<dyn Connector>,
    context: Arc<dyn DispatchContext>,
}

impl SessionBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            log_frames: false,
            router: InvocationRouter::new(),
            handlers: None,
            observer: Arc::new(NoopObserver),
            connector: Arc::new(WsConnector),
            context: Arc::new(InlineDispatch),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.url.clone()).with_log_frames(config.log_frames)
    }

    pub fn with_router(mut self, router: InvocationRouter) -> Self {
        self.router = router;
        self
    }

    /// Registers handlers that need to call back into the session.
    ///
    /// `register` runs once inside [`build`](Self::build), after the handlers
    /// from [`with_router`](Self::with_router). The [`WeakSession`] it receives
    /// only upgrades once `build` has returned.
    pub fn with_handlers<F>(mut self, register: F) -> Self
    where
        F: FnOnce(WeakSession, &mut InvocationRouter) + 'static,
    {
        self.handlers = Some(Box::new(register));
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_dispatch_context(mut self, context: Arc<dyn DispatchContext>) -> Self {
        self.context = context;
        self
    }

    pub fn with_log_frames(mut self, log_frames: bool) -> Self {
        self.log_frames = log_frames;
        self
    }

    /// Builds the session. An invalid URL is kept and reported by [`Session::start`].
    #[track_caller]
    pub fn build(self) -> Session {
        let address = parse_ws_url(&self.url).map_err(|message| TransportError::InvalidAddress {
            message,
            location: ErrorLocation::from(Location::caller()),
        });

        if let Err(ref e) = address {
            warn!("Session created with an unusable address: {e}");
        }

        let Self {
            log_frames,
            mut router,
            handlers,
            observer,
            connector,
            context,
            ..
        } = self;

        let inner = Arc::new_cyclic(|weak| {
            if let Some(register) = handlers {
                register(
                    WeakSession {
                        inner: Weak::clone(weak),
                    },
                    &mut router,
                );
            }

            let correlation = Arc::new(CorrelationTable::new());
            SessionInner {
                address,
                connector,
                context,
                observer,
                dispatcher: Dispatcher::new(router, Arc::clone(&correlation), log_frames),
                correlation,
                connection: Mutex::new(Connection {
                    transport: None,
                    lifecycle: Lifecycle::Created,
                    generation: 0,
                }),
                connection_id: RwLock::new(None),
            }
        });

        Session { inner }
    }
}

/// A bidirectional RPC session over one transport at a time.
///
/// Cheap to clone; clones share the same connection and pending invocations.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Non-owning handle to a [`Session`], for handlers the session itself owns.
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    /// The session, unless it has been dropped or is still being built.
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

struct Connection {
    transport: Option<Arc<dyn TransportHandle>>,
    lifecycle: Lifecycle,
    generation: u64,
}

struct SessionInner {
    address: Result<Url, TransportError>,
    connector: Arc<dyn Connector>,
    context: Arc<dyn DispatchContext>,
    observer: Arc<dyn SessionObserver>,
    dispatcher: Dispatcher,
    correlation: Arc<CorrelationTable>,
    connection: Mutex<Connection>,
    connection_id: RwLock<Option<String>>,
}

impl Session {
    pub fn builder(url: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(url)
    }

    /// Connects to the configured address, replacing any current transport.
    ///
    /// Never fails to the caller: an invalid address or a transport that cannot
    /// be opened is reported through [`SessionObserver::on_error`].
    pub fn start(&self) {
        let url = match &self.inner.address {
            Ok(url) => url.clone(),
            Err(e) => {
                error!("Cannot start session: {e}");
                self.report_error(e.clone());
                return;
            }
        };

        let (previous, generation) = {
            let mut connection = self.inner.lock_connection();
            connection.generation += 1;
            connection.lifecycle = Lifecycle::Connecting;
            (connection.transport.take(), connection.generation)
        };

        // State of the old connection goes before the new one can produce any.
        self.inner.clear_connection_id();
        self.inner.correlation.cancel_all(RpcError::connection_closed());

        if let Some(previous) = previous {
            info!("Closing previous transport before reconnecting");
            previous.close();
        }

        let events = event_sink(Arc::downgrade(&self.inner), generation);

        match self.inner.connector.connect(&url, events) {
            Ok(transport) => {
                let stale = {
                    let mut connection = self.inner.lock_connection();
                    if connection.generation == generation
                        && connection.lifecycle != Lifecycle::Closed
                    {
                        connection.transport = Some(Arc::from(transport));
                        None
                    } else {
                        Some(transport)
                    }
                };

                if let Some(transport) = stale {
                    debug!("Transport closed or replaced while connecting; discarding it");
                    transport.close();
                }
            }
            Err(e) => {
                {
                    let mut connection = self.inner.lock_connection();
                    if connection.generation == generation {
                        connection.lifecycle = Lifecycle::Closed;
                    }
                }
                error!("Failed to open transport to {url}: {e}");
                self.report_error(e);
            }
        }
    }

    /// Closes the transport and cancels every pending invocation. Idempotent.
    ///
    /// [`SessionObserver::on_close`] fires when the transport reports its close.
    pub fn close(&self) {
        let transport = {
            let mut connection = self.inner.lock_connection();
            connection.lifecycle = Lifecycle::Closed;
            connection.transport.take()
        };

        self.inner.clear_connection_id();
        self.inner.correlation.cancel_all(RpcError::connection_closed());

        if let Some(transport) = transport {
            info!("Closing session transport");
            transport.close();
        }
    }

    /// Invokes `method_name` on the peer and returns a handle for the reply.
    ///
    /// Returns immediately. If the session is not open the handle is already
    /// failed with [`RpcError::NotConnected`] and nothing is registered.
    pub fn invoke(&self, method_name: &str, args: impl IntoArguments) -> PendingResult {
        let arguments = match args.into_arguments() {
            Ok(arguments) => arguments,
            Err(e) => {
                return PendingResult::failed(RpcError::Encode {
                    message: format!("Arguments for {method_name} could not be encoded: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        if !self.is_open() {
            warn!("invoke({method_name}) while not connected");
            return PendingResult::failed(RpcError::not_connected());
        }

        let identifier = Uuid::new_v4().to_string();
        let (completion, pending) = PendingResult::channel(identifier.clone());

        if let Err(e) = self.inner.correlation.register(&identifier, completion) {
            return PendingResult::failed(e);
        }

        let descriptor = InvocationDescriptor::new(method_name, arguments, identifier.clone());
        if let Err(e) = self.inner.send_invocation(descriptor) {
            warn!("Failed to send invocation {identifier} of {method_name}: {e}");
            if let Some(completion) = self.inner.correlation.remove(&identifier) {
                let _ = completion.send(Err(e));
            }
        }

        pending
    }

    /// Invokes `method_name` on the peer without asking for a reply.
    ///
    /// # Errors
    ///
    /// [`RpcError::NotConnected`] if the session is not open, or an encode /
    /// transport error if the frame could not be sent.
    pub fn invoke_only(&self, method_name: &str, args: impl IntoArguments) -> Result<(), RpcError> {
        let arguments = args.into_arguments().map_err(|e| RpcError::Encode {
            message: format!("Arguments for {method_name} could not be encoded: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if !self.is_open() {
            warn!("invoke_only({method_name}) while not connected");
            return Err(RpcError::not_connected());
        }

        self.inner.send_invocation(InvocationDescriptor::new(
            method_name,
            arguments,
            SENTINEL_IDENTIFIER,
        ))
    }

    /// Connection id assigned by the peer, once a connection event arrived.
    pub fn connection_id(&self) -> Option<String> {
        self.inner
            .connection_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lock_connection().lifecycle
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == Lifecycle::Open
    }

    /// Number of awaited invocations still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.correlation.len()
    }

    fn report_error(&self, error: TransportError) {
        let session = self.clone();
        self.inner.context.dispatch(Box::new(move || {
            session.inner.observer.on_error(&session, &error);
        }));
    }

    /// Runs inside the dispatch context.
    fn on_transport_event(&self, generation: u64, event: TransportEvent) {
        let inner = &self.inner;

        match event {
            TransportEvent::Open => {
                {
                    let mut connection = inner.lock_connection();
                    if connection.generation != generation
                        || connection.lifecycle != Lifecycle::Connecting
                    {
                        debug!("Ignoring open event from a superseded transport");
                        return;
                    }
                    connection.lifecycle = Lifecycle::Open;
                }
                info!("Session open");
                inner.observer.on_open(self);
            }
            TransportEvent::Message(frame) => {
                if !inner.is_current(generation) {
                    debug!("Ignoring frame from a superseded transport");
                    return;
                }
                inner.dispatcher.handle(&frame, self);
            }
            TransportEvent::Close {
                code,
                reason,
                was_clean,
            } => {
                let finished = {
                    let mut connection = inner.lock_connection();
                    if connection.generation != generation {
                        debug!("Ignoring close event from a superseded transport");
                        return;
                    }
                    connection.lifecycle = Lifecycle::Closed;
                    connection.transport.take()
                };
                drop(finished);
                info!("Session closed (code {code}, clean: {was_clean})");
                inner.clear_connection_id();
                inner.correlation.cancel_all(RpcError::connection_closed());
                inner.observer.on_close(self, code, &reason, was_clean);
            }
            TransportEvent::Error(e) => {
                if !inner.is_current(generation) {
                    debug!("Ignoring error from a superseded transport: {e}");
                    return;
                }
                inner.observer.on_error(self, &e);
            }
        }
    }
}

/// Builds the sink handed to the transport. Every event is re-submitted to the
/// dispatch context before the session looks at it.
fn event_sink(inner: Weak<SessionInner>, generation: u64) -> EventSink {
    Arc::new(move |event| {
        let Some(inner) = inner.upgrade() else {
            debug!("Session dropped; ignoring transport event");
            return;
        };

        let session = Session { inner };
        let context = Arc::clone(&session.inner.context);
        context.dispatch(Box::new(move || session.on_transport_event(generation, event)));
    })
}

impl SessionInner {
    fn lock_connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_connection().generation == generation
    }

    fn clear_connection_id(&self) {
        *self
            .connection_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn send_invocation(&self, descriptor: InvocationDescriptor) -> Result<(), RpcError> {
        let frame = Envelope::encode(&Payload::Invocation(descriptor))?.to_frame()?;
        self.send_frame(frame)?;
        Ok(())
    }

    #[track_caller]
    fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        let transport = {
            let connection = self.lock_connection();
            match (&connection.transport, connection.lifecycle) {
                (Some(transport), Lifecycle::Open) => Some(Arc::clone(transport)),
                _ => None,
            }
        };

        match transport {
            Some(transport) => transport.send(frame),
            None => Err(TransportError::NotOpen {
                message: "Session transport is not open".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

impl SessionLink for Session {
    fn connected(&self, connection_id: String) {
        *self
            .inner
            .connection_id
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(connection_id.clone());
        self.inner.observer.on_connected(self, &connection_id);
    }

    fn text_message(&self, text: &str) {
        self.inner.observer.on_text_message(self, text);
    }

    fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        self.inner.send_frame(frame)
    }
}
