// Test doubles shared by the unit tests: an in-memory transport and a
// recording observer. The transport reports events synchronously when asked,
// the way a fast local socket can.

use crate::envelope::{Envelope, Payload};
use crate::error::transport::TransportError;
use crate::session::{Session, SessionObserver};
use crate::transport::{Connector, EventSink, TransportEvent, TransportHandle};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use url::Url;

#[derive(Default)]
struct MockState {
    sinks: Mutex<Vec<EventSink>>,
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
    fail_sends: AtomicBool,
    connect_events: Mutex<Vec<TransportEvent>>,
    close_reports: AtomicBool,
}

/// Connector whose transports record outbound frames and let tests inject events.
#[derive(Default)]
pub(crate) struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Delivers `event` through the most recently connected transport.
    pub(crate) fn emit(&self, event: TransportEvent) {
        let count = self.connect_count();
        assert!(count > 0, "emit called before any connect");
        self.emit_on(count - 1, event);
    }

    /// Delivers `event` through the transport opened by the `index`-th connect.
    pub(crate) fn emit_on(&self, index: usize, event: TransportEvent) {
        let sink = Arc::clone(&self.state.sinks.lock().unwrap()[index]);
        sink(event);
    }

    pub(crate) fn emit_frame(&self, payload: Payload) {
        self.emit(TransportEvent::Message(frame(payload)));
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.sinks.lock().unwrap().len()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_sends(&self) {
        self.state.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Every later connect reports `events` before returning its handle.
    pub(crate) fn report_during_connect(&self, events: Vec<TransportEvent>) {
        *self.state.connect_events.lock().unwrap() = events;
    }

    /// Closing a transport reports a clean 1000 close through its own sink.
    pub(crate) fn report_close_on_close(&self) {
        self.state.close_reports.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent_frames(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_payloads(&self) -> Vec<Payload> {
        self.sent_frames()
            .iter()
            .map(|frame| {
                Envelope::decode(frame)
                    .and_then(|envelope| envelope.decode_payload())
                    .expect("sent frame should decode")
            })
            .collect()
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        _url: &Url,
        events: EventSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        self.state.sinks.lock().unwrap().push(Arc::clone(&events));

        let early = self.state.connect_events.lock().unwrap().clone();
        for event in early {
            events(event);
        }

        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            events,
        }))
    }
}

struct MockHandle {
    state: Arc<MockState>,
    events: EventSink,
}

impl TransportHandle for MockHandle {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.state.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send {
                message: "mock send failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        self.state.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);

        if self.state.close_reports.load(Ordering::SeqCst) {
            (self.events)(TransportEvent::Close {
                code: 1000,
                reason: String::new(),
                was_clean: true,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Observed {
    Open,
    Connected(String),
    Text(String),
    Close {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error(String),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Observed) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn on_open(&self, _session: &Session) {
        self.push(Observed::Open);
    }

    fn on_connected(&self, _session: &Session, connection_id: &str) {
        self.push(Observed::Connected(connection_id.to_string()));
    }

    fn on_text_message(&self, _session: &Session, text: &str) {
        self.push(Observed::Text(text.to_string()));
    }

    fn on_close(&self, _session: &Session, code: u16, reason: &str, was_clean: bool) {
        self.push(Observed::Close {
            code,
            reason: reason.to_string(),
            was_clean,
        });
    }

    fn on_error(&self, _session: &Session, error: &TransportError) {
        self.push(Observed::Error(error.to_string()));
    }
}

/// Encodes `payload` into an inbound text frame.
pub(crate) fn frame(payload: Payload) -> String {
    Envelope::encode(&payload)
        .and_then(|envelope| envelope.to_frame())
        .expect("payload should encode")
}
