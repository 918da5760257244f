use crate::correlation::{Completion, Outcome};
use crate::error::rpc::RpcError;

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

/// Caller-side handle for an awaited invocation.
///
/// Resolves to the returned value or to an [`RpcError`]. Failures detected
/// before anything was sent (not connected, arguments not encodable) resolve
/// on the first poll. There is no timeout; race it against
/// `tokio::time::timeout` if one is needed.
#[derive(Debug)]
pub struct PendingResult {
    identifier: Option<String>,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingResult {
    /// Creates a handle for `identifier` plus the completion to register.
    pub(crate) fn channel(identifier: String) -> (Completion, Self) {
        let (tx, rx) = oneshot::channel();
        (
            tx,
            Self {
                identifier: Some(identifier),
                rx,
            },
        )
    }

    /// Creates a handle that is already failed.
    pub(crate) fn failed(error: RpcError) -> Self {
        let (tx, rx) = oneshot::channel();
        // The receiver is held right here, so the send cannot fail.
        let _ = tx.send(Err(error));
        Self {
            identifier: None,
            rx,
        }
    }

    /// Correlation identifier, or `None` if the invocation was never sent.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Waits for the reply and decodes the returned value into `T`.
    ///
    /// # Errors
    ///
    /// Any error the plain handle resolves to, or [`RpcError::ResultType`] if
    /// the value does not decode into `T`.
    pub async fn into_typed<T: DeserializeOwned>(self) -> Result<T, RpcError> {
        let value = self.await?;
        value.decode::<T>().map_err(|e| RpcError::ResultType {
            message: format!(
                "returned {} could not be decoded: {e}",
                value.type_name()
            ),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Future for PendingResult {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped completion means the table let go without resolving.
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(RpcError::connection_closed())))
    }
}
