//! Handler Module
//!
//! Consumers of decoded events.
//!
//! ## Architecture
//! - `ReceiveHandler`: one method per event, each a no-op by default, so a
//!   handler implements only what it cares about
//! - `HandlerChain`: ordered fan-out of every event to a list of handlers
//! - `LoggingHandler`: diagnostic trace of every event
//! - `MonitorHandler`: forwards monitored traffic to a `Monitor`
//!
//! All callbacks run on the engine's receive worker, one event at a time.
//! A handler that blocks stalls delivery of everything behind it.

mod chain;
mod logging;
mod monitor;

pub use chain::HandlerChain;
pub(crate) use chain::panic_message;
pub use logging::LoggingHandler;
pub use monitor::{Monitor, MonitorHandler};

use crate::event::DisconnectReason;
use crate::protocol::{HeardCall, PortCaps, VersionInfo};

/// Error type handlers may return; reported by the chain and then ignored
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned from every handler callback
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Receiver of server events.
///
/// Every method has an empty default implementation.
#[allow(unused_variables)]
pub trait ReceiveHandler: Send + Sync {
    /// `R`: server version
    fn version_info(&self, info: VersionInfo) -> HandlerResult {
        Ok(())
    }

    /// `X`: result of a callsign registration
    fn callsign_registered(&self, callsign: &str, success: bool) -> HandlerResult {
        Ok(())
    }

    /// `G`: descriptions of the available ports
    fn port_info(&self, ports: &[String]) -> HandlerResult {
        Ok(())
    }

    /// `g`: capabilities of one port
    fn port_caps(&self, port: u8, caps: &PortCaps) -> HandlerResult {
        Ok(())
    }

    /// `H`: one heard station. Called once per station, up to 20 times per
    /// request, with no end-of-list marker.
    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) -> HandlerResult {
        Ok(())
    }

    /// `y`: frames waiting for transmission on a port
    fn frames_waiting_on_port(&self, port: u8, frames: u32) -> HandlerResult {
        Ok(())
    }

    /// `C`: a connection was established, by us (`incoming == false`) or by
    /// a remote station
    fn connection_received(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        message: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// `D`: data on a connection
    fn connected_data(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        pid: u8,
        data: &[u8],
    ) -> HandlerResult {
        Ok(())
    }

    /// `d`: a connection ended. `message` contains "RETRYOUT" on timeout.
    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) -> HandlerResult {
        Ok(())
    }

    /// `Y`: frames waiting for transmission on a connection
    fn frames_waiting_on_connection(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        frames: u32,
    ) -> HandlerResult {
        Ok(())
    }

    /// `I`: monitored information frame
    fn monitored_connected(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        Ok(())
    }

    /// `S`: monitored supervisory frame
    fn monitored_supervisory(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
    ) -> HandlerResult {
        Ok(())
    }

    /// `U`: monitored unproto frame
    fn monitored_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        Ok(())
    }

    /// `T`: a frame this client sent, echoed while monitoring
    fn monitored_own(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        text: Option<&str>,
        data: &[u8],
    ) -> HandlerResult {
        Ok(())
    }

    /// `K`: raw AX.25 frame
    fn monitored_raw(&self, port: u8, data: &[u8]) -> HandlerResult {
        Ok(())
    }

    /// The server session ended, by request or otherwise. No further
    /// callbacks follow.
    fn server_disconnected(&self, reason: &DisconnectReason) -> HandlerResult {
        Ok(())
    }
}
