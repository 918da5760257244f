//! Request/response correlation.
//!
//! Maps the identifier of every awaited invocation to the single-shot channel
//! its caller is waiting on. `invoke` registers from arbitrary tasks while the
//! dispatch context resolves, so the map sits behind a mutex.

use crate::envelope::{SENTINEL_IDENTIFIER, TypedValue};
use crate::error::rpc::RpcError;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::sync::oneshot;

/// What a pending caller eventually receives.
pub type Outcome = Result<TypedValue, RpcError>;

/// Single-shot completion owned by the table until resolved.
pub type Completion = oneshot::Sender<Outcome>;

/// Pending awaited invocations keyed by correlation identifier.
#[derive(Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<String, Completion>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a completion under `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::DuplicateIdentifier`] if the identifier is already
    /// pending or is the fire-and-forget sentinel. The completion is dropped.
    #[track_caller]
    pub fn register(&self, identifier: &str, completion: Completion) -> Result<(), RpcError> {
        let mut pending = self.lock();

        if identifier == SENTINEL_IDENTIFIER || pending.contains_key(identifier) {
            return Err(RpcError::DuplicateIdentifier {
                identifier: identifier.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        pending.insert(identifier.to_string(), completion);
        Ok(())
    }

    /// Removes the entry for `identifier` and delivers `outcome` to it.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::UnknownCorrelation`] if nothing is pending under the
    /// identifier (already resolved, cancelled, or never registered).
    #[track_caller]
    pub fn resolve(&self, identifier: &str, outcome: Outcome) -> Result<(), RpcError> {
        // Remove under the lock, deliver outside it.
        let completion = self.lock().remove(identifier);

        let Some(completion) = completion else {
            return Err(RpcError::UnknownCorrelation {
                identifier: identifier.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        if completion.send(outcome).is_err() {
            debug!("Caller for {identifier} stopped waiting; reply discarded");
        }
        Ok(())
    }

    /// Removes the entry for `identifier` without delivering anything.
    pub fn remove(&self, identifier: &str) -> Option<Completion> {
        self.lock().remove(identifier)
    }

    /// Resolves every pending entry with `error`, leaving the table empty.
    ///
    /// Returns how many callers were cancelled.
    pub fn cancel_all(&self, error: RpcError) -> usize {
        let drained: Vec<(String, Completion)> = self.lock().drain().collect();
        let count = drained.len();

        for (identifier, completion) in drained {
            if completion.send(Err(error.clone())).is_err() {
                debug!("Caller for {identifier} stopped waiting before cancellation");
            }
        }

        if count > 0 {
            info!("Cancelled {count} pending invocation(s)");
        }
        count
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.lock().contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock leaves the map itself consistent, so keep using it.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Completion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
