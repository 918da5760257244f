//! Inbound envelope dispatch.
//!
//! One call to [`Dispatcher::handle`] per inbound frame, always from inside the
//! dispatch context. Nothing survives between frames except what lands in the
//! session (connection id) or the correlation table.

use crate::correlation::CorrelationTable;
use crate::envelope::{Envelope, InvocationDescriptor, InvocationResult, Payload, SENTINEL_IDENTIFIER};
use crate::error::transport::TransportError;
use crate::router::InvocationRouter;

use std::sync::Arc;

use log::{debug, error, info, warn};

/// What the dispatcher needs from the session that owns it.
pub trait SessionLink {
    /// Records the peer-assigned connection id and tells the application.
    fn connected(&self, connection_id: String);

    fn text_message(&self, text: &str);

    fn send_frame(&self, frame: String) -> Result<(), TransportError>;
}

pub struct Dispatcher {
    router: InvocationRouter,
    correlation: Arc<CorrelationTable>,
    log_frames: bool,
}

impl Dispatcher {
    pub fn new(router: InvocationRouter, correlation: Arc<CorrelationTable>, log_frames: bool) -> Self {
        Self {
            router,
            correlation,
            log_frames,
        }
    }

    /// Handles one inbound frame.
    ///
    /// Malformed frames are logged and dropped; nothing here returns an error
    /// or panics on bad input.
    pub fn handle(&self, frame: &str, link: &dyn SessionLink) {
        if self.log_frames {
            info!("[WS LOG] {frame}");
        }

        let payload = match Envelope::decode(frame).and_then(|envelope| envelope.decode_payload()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping inbound frame: {e}");
                return;
            }
        };

        match payload {
            Payload::ConnectionEvent(connection_id) => {
                info!("Peer assigned connection id {connection_id}");
                link.connected(connection_id);
            }
            Payload::Text(text) => link.text_message(&text),
            Payload::Invocation(descriptor) => self.handle_invocation(&descriptor, link),
            Payload::InvocationResult(result) => self.handle_result(result),
        }
    }

    fn handle_invocation(&self, descriptor: &InvocationDescriptor, link: &dyn SessionLink) {
        let reply = self.router.invoke(descriptor);

        if descriptor.is_fire_and_forget() {
            debug!("No reply for fire-and-forget {}", descriptor.method_name);
            return;
        }

        let frame = match Envelope::encode(&Payload::InvocationResult(reply))
            .and_then(|envelope| envelope.to_frame())
        {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode reply for {}: {e}", descriptor.identifier);
                return;
            }
        };

        if let Err(e) = link.send_frame(frame) {
            warn!("Failed to send reply for {}: {e}", descriptor.identifier);
        }
    }

    fn handle_result(&self, result: InvocationResult) {
        if result.identifier == SENTINEL_IDENTIFIER {
            debug!("Ignoring reply addressed to the fire-and-forget identifier");
            return;
        }

        let identifier = result.identifier.clone();
        if let Err(e) = self.correlation.resolve(&identifier, result.into_outcome()) {
            warn!("{e}");
        }
    }
}
