//! Monitor support
//!
//! A narrower callback surface for applications that only watch traffic.

use std::sync::Arc;

use parking_lot::RwLock;

use super::{HandlerResult, ReceiveHandler};

/// Receiver of monitored traffic. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait Monitor: Send + Sync {
    fn monitored_connected(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {}

    fn monitored_supervisory(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>) {}

    fn monitored_unproto(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {}

    fn monitored_own(&self, port: u8, call_from: &str, call_to: &str, text: Option<&str>, data: &[u8]) {}

    fn monitored_raw(&self, port: u8, data: &[u8]) {}
}

/// Forwards monitoring events to the current `Monitor`, if one is set.
#[derive(Default)]
pub struct MonitorHandler {
    monitor: RwLock<Option<Arc<dyn Monitor>>>,
}

impl MonitorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the monitor; may be called while connected
    pub fn set_monitor(&self, monitor: Option<Arc<dyn Monitor>>) {
        *self.monitor.write() = monitor;
    }

    pub fn monitor(&self) -> Option<Arc<dyn Monitor>> {
        self.monitor.read().clone()
    }

    fn with_monitor(&self, f: impl FnOnce(&dyn Monitor)) -> HandlerResult {
        // Clone out so a monitor may call set_monitor without deadlocking.
        if let Some(monitor) = self.monitor() {
            f(monitor.as_ref());
        }
        Ok(())
    }
}

impl ReceiveHandler for MonitorHandler {
    fn monitored_connected(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        self.with_monitor(|m| m.monitored_connected(port, call_from, call_to, text, data))
    }

    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) -> HandlerResult {
        self.with_monitor(|m| m.monitored_supervisory(port, call_from, call_to, text))
    }

    fn monitored_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        self.with_monitor(|m| m.monitored_unproto(port, call_from, call_to, text, data))
    }

    fn monitored_own(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        self.with_monitor(|m| m.monitored_own(port, call_from, call_to, text, data))
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) -> HandlerResult {
        self.with_monitor(|m| m.monitored_raw(port, data))
    }
}
