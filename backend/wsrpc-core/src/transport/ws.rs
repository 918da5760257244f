//! WebSocket client transport on `tokio-tungstenite`.
//!
//! Each connection runs as one background task that owns the socket: it writes
//! frames queued by [`TransportHandle::send`] and reports every inbound text
//! frame to the event sink.

use crate::error::transport::TransportError;
use crate::transport::{Connector, EventSink, TransportEvent, TransportHandle};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Close code reported when the socket went away without a close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported when this side closed the socket.
const NORMAL_CLOSE_CODE: u16 = 1000;

/// Opens WebSocket connections (`ws://`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    #[track_caller]
    fn connect(
        &self,
        url: &Url,
        events: EventSink,
    ) -> Result<Box<dyn TransportHandle>, TransportError> {
        let runtime = Handle::try_current().map_err(|e| TransportError::Runtime {
            message: format!("WebSocket transport needs a tokio runtime: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));

        runtime.spawn(run_connection(
            url.clone(),
            events,
            outbound_rx,
            Arc::clone(&open),
        ));

        Ok(Box::new(WsHandle { outbound_tx, open }))
    }
}

enum Outbound {
    Frame(String),
    Close,
}

struct WsHandle {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    open: Arc<AtomicBool>,
}

impl TransportHandle for WsHandle {
    #[track_caller]
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen {
                message: "WebSocket is not open".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        self.outbound_tx
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Send {
                message: "WebSocket connection task has stopped".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        // The task may already be gone, which is the state we want anyway.
        let _ = self.outbound_tx.send(Outbound::Close);
    }
}

/// Owns one WebSocket connection from handshake to close.
async fn run_connection(
    url: Url,
    events: EventSink,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    open: Arc<AtomicBool>,
) {
    info!("Connecting to {url}");

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            error!("WebSocket connect to {url} failed: {e}");
            events(TransportEvent::Error(TransportError::Connect {
                message: format!("Failed to connect to {url}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            }));
            events(TransportEvent::Close {
                code: ABNORMAL_CLOSE_CODE,
                reason: e.to_string(),
                was_clean: false,
            });
            return;
        }
    };

    info!("Connected to {url}");
    open.store(true, Ordering::SeqCst);
    events(TransportEvent::Open);

    let (mut write, mut read) = ws_stream.split();

    let close_event = loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = write.send(Message::Text(frame.into())).await {
                        error!("Failed to send frame to {url}: {e}");
                        events(TransportEvent::Error(TransportError::Send {
                            message: format!("Failed to send frame: {e}"),
                            location: ErrorLocation::from(Location::caller()),
                        }));
                    }
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = write.close().await {
                        debug!("Close handshake with {url} did not complete: {e}");
                    }
                    break TransportEvent::Close {
                        code: NORMAL_CLOSE_CODE,
                        reason: String::new(),
                        was_clean: true,
                    };
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => events(TransportEvent::Message(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => events(TransportEvent::Message(text)),
                    Err(e) => warn!("Ignoring non-UTF-8 binary frame from {url}: {e}"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|frame| (u16::from(frame.code), frame.reason.as_str().to_owned()))
                        .unwrap_or((NORMAL_CLOSE_CODE, String::new()));
                    break TransportEvent::Close {
                        code,
                        reason,
                        was_clean: true,
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Error reading from {url}: {e}");
                    events(TransportEvent::Error(TransportError::Receive {
                        message: format!("Error reading frame: {e}"),
                        location: ErrorLocation::from(Location::caller()),
                    }));
                    break TransportEvent::Close {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: e.to_string(),
                        was_clean: false,
                    };
                }
                None => {
                    break TransportEvent::Close {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: "connection dropped".to_string(),
                        was_clean: false,
                    };
                }
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    info!("Disconnected from {url}");
    events(close_event);
}
