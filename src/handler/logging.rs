//! Diagnostic handler that logs every event at debug level.

use std::sync::atomic::{AtomicBool, Ordering};

use super::{HandlerResult, ReceiveHandler};
use crate::event::DisconnectReason;
use crate::protocol::{HeardCall, PortCaps, VersionInfo};

/// Logs each callback and its arguments through `tracing`.
///
/// Place it first in the chain so raw events are recorded before any other
/// handler interprets them.
pub struct LoggingHandler {
    enabled: AtomicBool,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Default for LoggingHandler {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! log_event {
    ($self:ident, $($arg:tt)+) => {
        if $self.is_enabled() {
            tracing::debug!(target: "packet_engine::events", $($arg)+);
        }
        return Ok(())
    };
}

impl ReceiveHandler for LoggingHandler {
    fn version_info(&self, info: VersionInfo) -> HandlerResult {
        log_event!(self, "version_info: {}", info);
    }

    fn callsign_registered(&self, callsign: &str, success: bool) -> HandlerResult {
        log_event!(self, "callsign_registered: callsign={} success={}", callsign, success);
    }

    fn port_info(&self, ports: &[String]) -> HandlerResult {
        log_event!(self, "port_info: {:?}", ports);
    }

    fn port_caps(&self, port: u8, caps: &PortCaps) -> HandlerResult {
        log_event!(self, "port_caps: port={} caps={:?}", port, caps);
    }

    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) -> HandlerResult {
        log_event!(self, "callsign_heard_on_port: port={} heard={:?}", port, heard);
    }

    fn frames_waiting_on_port(&self, port: u8, frames: u32) -> HandlerResult {
        log_event!(self, "frames_waiting_on_port: port={} frames={}", port, frames);
    }

    fn connection_received(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        message: &str,
    ) -> HandlerResult {
        log_event!(
            self,
            "connection_received: port={} from={} to={} incoming={} message={:?}",
            port, call_from, call_to, incoming, message
        );
    }

    fn connected_data(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        pid: u8,
        data: &[u8],
    ) -> HandlerResult {
        log_event!(
            self,
            "connected_data: port={} from={} to={} pid={:#04x} len={}",
            port, call_from, call_to, pid, data.len()
        );
    }

    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) -> HandlerResult {
        log_event!(
            self,
            "disconnected: port={} from={} to={} message={:?}",
            port, call_from, call_to, message
        );
    }

    fn frames_waiting_on_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        frames: u32,
    ) -> HandlerResult {
        log_event!(
            self,
            "frames_waiting_on_connection: port={} from={} to={} frames={}",
            port, call_from, call_to, frames
        );
    }

    fn monitored_connected(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        log_event!(
            self,
            "monitored_connected: port={} from={} to={} text={:?} len={}",
            port, call_from, call_to, text, data.len()
        );
    }

    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) -> HandlerResult {
        log_event!(
            self,
            "monitored_supervisory: port={} from={} to={} text={:?}",
            port, call_from, call_to, text
        );
    }

    fn monitored_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        log_event!(
            self,
            "monitored_unproto: port={} from={} to={} text={:?} len={}",
            port, call_from, call_to, text, data.len()
        );
    }

    fn monitored_own(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        log_event!(
            self,
            "monitored_own: port={} from={} to={} text={:?} len={}",
            port, call_from, call_to, text, data.len()
        );
    }

    fn monitored_raw(&self, port: u8, data: &[u8]) -> HandlerResult {
        log_event!(self, "monitored_raw: port={} len={}", port, data.len());
    }

    fn server_disconnected(&self, reason: &DisconnectReason) -> HandlerResult {
        log_event!(self, "server_disconnected: {:?}", reason);
    }
}
