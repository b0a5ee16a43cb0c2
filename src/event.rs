//! Events
//!
//! Typed form of every frame the server can send, plus the engine's own
//! session events. The worker decodes each frame into one `Event` and
//! dispatches it through the handler chain.

use bytes::Bytes;

use crate::error::{EngineError, Result};
use crate::handler::{HandlerResult, ReceiveHandler};
use crate::protocol::payload::{
    parse_count, parse_heard, parse_port_caps, parse_port_info, parse_version,
};
use crate::protocol::{Frame, FrameKind, HeardCall, PortCaps, ReceiveLength, VersionInfo};

/// Prefix of the connection message for remotely initiated connections
pub const INCOMING_CONNECT_PREFIX: &str = "*** CONNECTED To ";

/// Why the server session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect_from_server` was called
    Requested,
    /// The server closed the stream
    Closed,
    /// A transport error ended the stream
    Transport(String),
    /// The stream produced an undecodable frame
    Framing(String),
}

/// A decoded server event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    VersionInfo(VersionInfo),
    CallsignRegistered {
        callsign: String,
        success: bool,
    },
    PortInfo(Vec<String>),
    PortCaps {
        port: u8,
        caps: PortCaps,
    },
    /// One heard station. `None` for empty or unreadable records.
    CallsignHeard {
        port: u8,
        heard: Option<HeardCall>,
    },
    FramesWaitingOnPort {
        port: u8,
        frames: u32,
    },
    ConnectionReceived {
        port: u8,
        call_from: String,
        call_to: String,
        incoming: bool,
        message: String,
    },
    ConnectedData {
        port: u8,
        call_from: String,
        call_to: String,
        pid: u8,
        data: Bytes,
    },
    Disconnected {
        port: u8,
        call_from: String,
        call_to: String,
        message: String,
    },
    FramesWaitingOnConnection {
        port: u8,
        call_from: String,
        call_to: String,
        frames: u32,
    },
    MonitoredConnected {
        port: u8,
        call_from: String,
        call_to: String,
        text: Option<String>,
        data: Bytes,
    },
    MonitoredSupervisory {
        port: u8,
        call_from: String,
        call_to: String,
        text: Option<String>,
    },
    MonitoredUnproto {
        port: u8,
        call_from: String,
        call_to: String,
        text: Option<String>,
        data: Bytes,
    },
    MonitoredOwn {
        port: u8,
        call_from: String,
        call_to: String,
        text: Option<String>,
        data: Bytes,
    },
    MonitoredRaw {
        port: u8,
        data: Bytes,
    },
    /// The session with the server has ended; always the last event
    ServerDisconnected(DisconnectReason),
}

impl Event {
    /// Decode a received frame.
    ///
    /// Frames that are well formed but invalid in the server→client
    /// direction, or whose fixed-size payload has the wrong length, are
    /// protocol violations.
    pub fn from_frame(frame: &Frame) -> Result<Event> {
        match frame.kind.receive_length() {
            ReceiveLength::NotPermitted => {
                let why = match frame.kind {
                    FrameKind::Unknown(_) => "unknown kind",
                    _ => "not sent by servers",
                };
                return Err(EngineError::ProtocolViolation(format!(
                    "received frame {}: {}",
                    frame.kind, why
                )));
            }
            ReceiveLength::Fixed(len) if frame.payload.len() != len => {
                return Err(EngineError::ProtocolViolation(format!(
                    "frame {} carries {} bytes instead of {}",
                    frame.kind,
                    frame.payload.len(),
                    len
                )));
            }
            _ => {}
        }

        let port = frame.port;
        let event = match frame.kind {
            FrameKind::Version => Event::VersionInfo(parse_version(&frame.payload)?),
            FrameKind::PortInfo => Event::PortInfo(parse_port_info(&frame.payload)),
            FrameKind::PortCaps => Event::PortCaps {
                port,
                caps: parse_port_caps(&frame.payload)?,
            },
            FrameKind::RegisterCallsign => Event::CallsignRegistered {
                callsign: frame.call_from.clone(),
                success: frame.payload[0] != 0,
            },
            FrameKind::FramesOnPort => Event::FramesWaitingOnPort {
                port,
                frames: parse_count(&frame.payload)?,
            },
            FrameKind::FramesOnConnection => Event::FramesWaitingOnConnection {
                port,
                call_from: frame.call_from.clone(),
                call_to: frame.call_to.clone(),
                frames: parse_count(&frame.payload)?,
            },
            FrameKind::Heard => Event::CallsignHeard {
                port,
                heard: parse_heard(&frame.payload),
            },
            FrameKind::Connect => {
                let message = frame.payload_text();
                Event::ConnectionReceived {
                    port,
                    call_from: frame.call_from.clone(),
                    call_to: frame.call_to.clone(),
                    incoming: message.starts_with(INCOMING_CONNECT_PREFIX),
                    message,
                }
            }
            FrameKind::Data => Event::ConnectedData {
                port,
                call_from: frame.call_from.clone(),
                call_to: frame.call_to.clone(),
                pid: frame.pid,
                data: frame.payload.clone(),
            },
            FrameKind::Disconnect => Event::Disconnected {
                port,
                call_from: frame.call_from.clone(),
                call_to: frame.call_to.clone(),
                message: frame.payload_text(),
            },
            FrameKind::Raw => Event::MonitoredRaw {
                port,
                data: frame.payload.clone(),
            },
            kind if kind.is_monitor() => monitor_event(frame),
            kind => {
                return Err(EngineError::ProtocolViolation(format!(
                    "no decoder for frame {}",
                    kind
                )))
            }
        };
        Ok(event)
    }

    /// Name of the handler method this event is delivered to
    pub fn name(&self) -> &'static str {
        match self {
            Event::VersionInfo(_) => "version_info",
            Event::CallsignRegistered { .. } => "callsign_registered",
            Event::PortInfo(_) => "port_info",
            Event::PortCaps { .. } => "port_caps",
            Event::CallsignHeard { .. } => "callsign_heard_on_port",
            Event::FramesWaitingOnPort { .. } => "frames_waiting_on_port",
            Event::ConnectionReceived { .. } => "connection_received",
            Event::ConnectedData { .. } => "connected_data",
            Event::Disconnected { .. } => "disconnected",
            Event::FramesWaitingOnConnection { .. } => "frames_waiting_on_connection",
            Event::MonitoredConnected { .. } => "monitored_connected",
            Event::MonitoredSupervisory { .. } => "monitored_supervisory",
            Event::MonitoredUnproto { .. } => "monitored_unproto",
            Event::MonitoredOwn { .. } => "monitored_own",
            Event::MonitoredRaw { .. } => "monitored_raw",
            Event::ServerDisconnected(_) => "server_disconnected",
        }
    }

    /// Call the handler method matching this event
    pub fn deliver(&self, handler: &dyn ReceiveHandler) -> HandlerResult {
        match self {
            Event::VersionInfo(info) => handler.version_info(*info),
            Event::CallsignRegistered { callsign, success } => {
                handler.callsign_registered(callsign, *success)
            }
            Event::PortInfo(ports) => handler.port_info(ports),
            Event::PortCaps { port, caps } => handler.port_caps(*port, caps),
            Event::CallsignHeard { port, heard } => {
                handler.callsign_heard_on_port(*port, heard.as_ref())
            }
            Event::FramesWaitingOnPort { port, frames } => {
                handler.frames_waiting_on_port(*port, *frames)
            }
            Event::ConnectionReceived {
                port,
                call_from,
                call_to,
                incoming,
                message,
            } => handler.connection_received(*port, call_from, call_to, *incoming, message),
            Event::ConnectedData {
                port,
                call_from,
                call_to,
                pid,
                data,
            } => handler.connected_data(*port, call_from, call_to, *pid, data),
            Event::Disconnected {
                port,
                call_from,
                call_to,
                message,
            } => handler.disconnected(*port, call_from, call_to, message),
            Event::FramesWaitingOnConnection {
                port,
                call_from,
                call_to,
                frames,
            } => handler.frames_waiting_on_connection(*port, call_from, call_to, *frames),
            Event::MonitoredConnected {
                port,
                call_from,
                call_to,
                text,
                data,
            } => handler.monitored_connected(*port, call_from, call_to, text.as_deref(), data),
            Event::MonitoredSupervisory {
                port,
                call_from,
                call_to,
                text,
            } => handler.monitored_supervisory(*port, call_from, call_to, text.as_deref()),
            Event::MonitoredUnproto {
                port,
                call_from,
                call_to,
                text,
                data,
            } => handler.monitored_unproto(*port, call_from, call_to, text.as_deref(), data),
            Event::MonitoredOwn {
                port,
                call_from,
                call_to,
                text,
                data,
            } => handler.monitored_own(*port, call_from, call_to, text.as_deref(), data),
            Event::MonitoredRaw { port, data } => handler.monitored_raw(*port, data),
            Event::ServerDisconnected(reason) => handler.server_disconnected(reason),
        }
    }
}

fn monitor_event(frame: &Frame) -> Event {
    let record = crate::protocol::payload::split_monitor_data(&frame.payload);
    let (port, call_from, call_to) = (frame.port, frame.call_from.clone(), frame.call_to.clone());
    match frame.kind {
        FrameKind::MonitoredConnected => Event::MonitoredConnected {
            port,
            call_from,
            call_to,
            text: record.text,
            data: record.data,
        },
        // Trailing supervisory data stays on the frame; no event carries it yet.
        FrameKind::MonitoredSupervisory => Event::MonitoredSupervisory {
            port,
            call_from,
            call_to,
            text: record.text,
        },
        FrameKind::MonitoredOwn => Event::MonitoredOwn {
            port,
            call_from,
            call_to,
            text: record.text,
            data: record.data,
        },
        _ => Event::MonitoredUnproto {
            port,
            call_from,
            call_to,
            text: record.text,
            data: record.data,
        },
    }
}
