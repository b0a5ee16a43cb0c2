//! Handler chain
//!
//! Ordered multi-dispatch of events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::event::Event;

use super::ReceiveHandler;

/// An ordered list of handlers.
///
/// Every event goes to every handler, in insertion order, whatever earlier
/// handlers did. The chain is moved into the engine's worker on connect, so
/// it cannot change while events are being dispatched.
///
/// Recommended order: diagnostics first, bookkeeping (connection registry,
/// monitor translation) next, application handlers last.
#[derive(Default, Clone)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn ReceiveHandler>>,
}

/// Outcome of dispatching one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that were invoked
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl HandlerChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Adding a handler already in the chain is a no-op.
    pub fn add(mut self, handler: Arc<dyn ReceiveHandler>) -> Self {
        self.push(handler);
        self
    }

    /// Append a handler in place
    pub fn push(&mut self, handler: Arc<dyn ReceiveHandler>) {
        if !self.contains(&handler) {
            self.handlers.push(handler);
        }
    }

    /// Remove a handler, keeping the order of the rest
    pub fn remove(mut self, handler: &Arc<dyn ReceiveHandler>) -> Self {
        self.handlers.retain(|h| !same_handler(h, handler));
        self
    }

    pub fn contains(&self, handler: &Arc<dyn ReceiveHandler>) -> bool {
        self.handlers.iter().any(|h| same_handler(h, handler))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver an event to every handler in order.
    ///
    /// An error or panic in one handler is logged and does not stop delivery
    /// to the handlers after it.
    pub fn dispatch(&self, event: &Event) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (index, handler) in self.handlers.iter().enumerate() {
            report.delivered += 1;
            match panic::catch_unwind(AssertUnwindSafe(|| event.deliver(handler.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!("Handler #{} failed in {}: {}", index, event.name(), e);
                }
                Err(payload) => {
                    report.failed += 1;
                    tracing::error!(
                        "Handler #{} panicked in {}: {}",
                        index,
                        event.name(),
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

// Compare data pointers only; vtable pointers for one type can differ.
fn same_handler(a: &Arc<dyn ReceiveHandler>, b: &Arc<dyn ReceiveHandler>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
