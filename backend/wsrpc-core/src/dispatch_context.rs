//! Execution context that serializes inbound event handling.
//!
//! The transport delivers events on its own I/O task. Every event is submitted
//! to a [`DispatchContext`] as a job, and the context guarantees jobs run one at
//! a time in submission order. Handlers, the dispatcher and the correlation
//! table therefore never see concurrent inbound events.

use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

use log::{info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A unit of inbound work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that runs submitted jobs sequentially, one owner at a time.
pub trait DispatchContext: Send + Sync + 'static {
    fn dispatch(&self, job: Job);
}

/// Runs each job immediately on the submitting task.
///
/// Sequential only as long as every job comes from a single task, which holds
/// for one transport reader. Used in tests and embedded setups.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatch;

impl DispatchContext for InlineDispatch {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Runs jobs on a dedicated tokio task fed by an unbounded channel.
///
/// Clones share the same worker. The worker stops once every clone is dropped.
#[derive(Debug, Clone)]
pub struct WorkerDispatch {
    job_tx: mpsc::UnboundedSender<Job>,
}

impl WorkerDispatch {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Runtime`] when called outside a tokio runtime.
    #[track_caller]
    pub fn spawn() -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|e| TransportError::Runtime {
            message: format!("Dispatch worker needs a tokio runtime: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        runtime.spawn(dispatch_worker(job_rx));

        Ok(Self { job_tx })
    }
}

impl DispatchContext for WorkerDispatch {
    fn dispatch(&self, job: Job) {
        if self.job_tx.send(job).is_err() {
            warn!("Dispatch worker stopped; dropping inbound job");
        }
    }
}

async fn dispatch_worker(mut job_rx: mpsc::UnboundedReceiver<Job>) {
    info!("Dispatch worker started");

    while let Some(job) = job_rx.recv().await {
        job();
    }

    info!("Dispatch worker stopped");
}
