//! Demo handlers and observer wired up by the binary.

use wsrpc_core::TransportError;
use wsrpc_core::router::InvocationRouter;
use wsrpc_core::session::{Session, SessionObserver};

use log::{error, info, warn};

/// Handlers the peer can call on this client.
///
/// - `echo(string) -> string`
/// - `add(int, int) -> int`, failing on overflow
/// - `ping() -> string`
pub fn demo_router() -> InvocationRouter {
    let mut router = InvocationRouter::new();

    router
        .register("echo", |text: String| -> Result<String, String> {
            info!("echo({text})");
            Ok(text)
        })
        .register("add", |a: i32, b: i32| -> Result<i32, String> {
            a.checked_add(b)
                .ok_or_else(|| format!("{a} + {b} overflows int"))
        })
        .register("ping", || -> Result<String, String> { Ok("pong".to_string()) });

    router
}

/// Observer that reports session events to the log.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_open(&self, _session: &Session) {
        info!("Connected to peer");
    }

    fn on_connected(&self, _session: &Session, connection_id: &str) {
        info!("Peer assigned connection id {connection_id}");
    }

    fn on_text_message(&self, _session: &Session, text: &str) {
        info!("Peer says: {text}");
    }

    fn on_close(&self, _session: &Session, code: u16, reason: &str, was_clean: bool) {
        if was_clean {
            info!("Connection closed (code {code}) {reason}");
        } else {
            warn!("Connection lost (code {code}) {reason}");
        }
    }

    fn on_error(&self, _session: &Session, e: &TransportError) {
        error!("{e}");
    }
}
