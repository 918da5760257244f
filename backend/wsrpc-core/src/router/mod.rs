//! Inbound invocation routing.
//!
//! Handlers are registered by the application at startup under a method name.
//! The lookup key is the name plus the declared type names of the arguments,
//! so `add(int, int)` and `add(double, double)` are distinct handlers.

mod handler;

pub use handler::Handler;

use crate::envelope::{InvocationDescriptor, InvocationResult, TypedValue};
use handler::{ErasedHandler, TypedHandler};

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, warn};

/// Reply text when no handler matches the name and argument types.
pub const METHOD_NOT_FOUND_MESSAGE: &str = "method does not exist or is not properly defined";

/// Reply text when a matching handler failed.
pub const HANDLER_FAILED_MESSAGE: &str = "client method raised an exception";

/// Failure reason recorded when a handler produced no value.
pub const NO_VALUE_REASON: &str = "client method returned no value";

/// Result of routing one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Returned(TypedValue),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub method_name: String,
    pub arg_types: Vec<String>,
}

/// Static dispatch table from [`HandlerKey`] to handler.
#[derive(Default)]
pub struct InvocationRouter {
    handlers: HashMap<HandlerKey, Box<dyn ErasedHandler>>,
}

impl InvocationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `method_name` and its argument types.
    ///
    /// A handler already registered under the same key is replaced.
    pub fn register<Args, H>(&mut self, method_name: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<Args>,
        Args: 'static,
    {
        let key = HandlerKey {
            method_name: method_name.into(),
            arg_types: H::arg_types(),
        };

        if self.handlers.contains_key(&key) {
            warn!(
                "Replacing handler for {}({})",
                key.method_name,
                key.arg_types.join(", ")
            );
        }

        self.handlers
            .insert(key, Box::new(TypedHandler::<H, Args>::new(handler)));
        self
    }

    /// Finds and runs the handler for `descriptor`.
    ///
    /// Handler panics are caught and reported as [`RouteOutcome::Failed`].
    pub fn route(&self, descriptor: &InvocationDescriptor) -> RouteOutcome {
        let key = HandlerKey {
            method_name: descriptor.method_name.clone(),
            arg_types: descriptor.arguments.type_names(),
        };

        let Some(handler) = self.handlers.get(&key) else {
            debug!(
                "No handler for {}({})",
                key.method_name,
                key.arg_types.join(", ")
            );
            return RouteOutcome::NotFound;
        };

        catch_unwind(AssertUnwindSafe(|| {
            handler.call(descriptor.arguments.as_slice())
        }))
        .unwrap_or_else(|panic| RouteOutcome::Failed(panic_reason(&*panic)))
    }

    /// Routes `descriptor` and turns the outcome into a reply.
    pub fn invoke(&self, descriptor: &InvocationDescriptor) -> InvocationResult {
        let identifier = descriptor.identifier.clone();

        match self.route(descriptor) {
            RouteOutcome::Returned(value) => InvocationResult::success(identifier, value),
            RouteOutcome::NotFound => {
                warn!(
                    "Inbound invocation of {} matched no handler",
                    descriptor.method_name
                );
                InvocationResult::failure(identifier, METHOD_NOT_FOUND_MESSAGE)
            }
            RouteOutcome::Failed(reason) => {
                warn!("Handler for {} failed: {reason}", descriptor.method_name);
                InvocationResult::failure(identifier, HANDLER_FAILED_MESSAGE)
            }
        }
    }

    /// True if any handler is registered under `method_name`, whatever its arguments.
    pub fn contains(&self, method_name: &str) -> bool {
        self.handlers
            .keys()
            .any(|key| key.method_name == method_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
