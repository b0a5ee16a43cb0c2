//! Request builders
//!
//! One function per client→server request. Each returns the complete
//! frame; callsign widths are checked when the frame is encoded.

use bytes::{BufMut, Bytes, BytesMut};

use super::payload::{encode_login, encode_via_list};
use super::{Frame, FrameKind};
use crate::error::{EngineError, Result};

/// PID for plain AX.25 layer 3 ("no layer 3 protocol")
pub const PID_NO_L3: u8 = 0xF0;

/// Leading byte of a raw frame payload: KISS data command for the header's port.
/// Without it the controller interprets the first address byte as the selector.
pub const RAW_PORT_SELECTOR: u8 = 0x00;

// =============================================================================
// Port Independent Requests
// =============================================================================

pub fn login(user: &[u8], password: &[u8]) -> Result<Frame> {
    Ok(Frame::new(FrameKind::Login, 0).with_payload(encode_login(user, password)?))
}

pub fn ask_version() -> Frame {
    Frame::new(FrameKind::Version, 0)
}

pub fn ask_port_info() -> Frame {
    Frame::new(FrameKind::PortInfo, 0)
}

pub fn register_callsign(callsign: &str) -> Frame {
    Frame::new(FrameKind::RegisterCallsign, 0).with_calls(callsign, "")
}

pub fn unregister_callsign(callsign: &str) -> Frame {
    Frame::new(FrameKind::UnregisterCallsign, 0).with_calls(callsign, "")
}

/// Monitoring has no explicit on/off: each request flips the server's state
pub fn toggle_monitoring() -> Frame {
    Frame::new(FrameKind::ToggleMonitoring, 0)
}

/// Raw reception has no explicit on/off: each request flips the server's state
pub fn toggle_raw() -> Frame {
    Frame::new(FrameKind::ToggleRaw, 0)
}

// =============================================================================
// Port Specific Requests
// =============================================================================

pub fn ask_port_caps(port: u8) -> Frame {
    Frame::new(FrameKind::PortCaps, port)
}

pub fn ask_heard(port: u8) -> Frame {
    Frame::new(FrameKind::Heard, port)
}

pub fn ask_frames_on_port(port: u8) -> Frame {
    Frame::new(FrameKind::FramesOnPort, port)
}

pub fn ask_frames_on_connection(port: u8, call_from: &str, call_to: &str) -> Frame {
    Frame::new(FrameKind::FramesOnConnection, port).with_calls(call_from, call_to)
}

/// Unproto (UI) frame, optionally through a via path.
///
/// With vias the payload is the via list followed by the data.
pub fn unproto(port: u8, call_from: &str, call_to: &str, data: &[u8], via: &[&str]) -> Result<Frame> {
    let frame = Frame::new(FrameKind::Unproto, port)
        .with_calls(call_from, call_to)
        .with_pid(PID_NO_L3);
    if via.is_empty() {
        return Ok(frame.with_payload(Bytes::copy_from_slice(data)));
    }
    let mut payload = encode_via_list(via)?;
    payload.put_slice(data);
    Ok(Frame {
        kind: FrameKind::UnprotoVia,
        ..frame.with_payload(payload.freeze())
    })
}

/// Connect request.
///
/// A PID other than the default needs the `c` form, which the protocol only
/// offers without vias.
pub fn connect(port: u8, call_from: &str, call_to: &str, via: &[&str], pid: Option<u8>) -> Result<Frame> {
    let frame = Frame::new(FrameKind::Connect, port).with_calls(call_from, call_to);
    if !via.is_empty() {
        if pid.is_some_and(|p| p != PID_NO_L3) {
            return Err(EngineError::Format(
                "a non-default PID cannot be combined with a via path".to_string(),
            ));
        }
        return Ok(Frame {
            kind: FrameKind::ConnectVia,
            ..frame.with_pid(PID_NO_L3).with_payload(encode_via_list(via)?.freeze())
        });
    }
    Ok(match pid {
        None => frame.with_pid(PID_NO_L3),
        Some(pid) => Frame {
            kind: FrameKind::ConnectWithPid,
            ..frame.with_pid(pid)
        },
    })
}

pub fn send_data(port: u8, call_from: &str, call_to: &str, pid: u8, data: &[u8]) -> Frame {
    Frame::new(FrameKind::Data, port)
        .with_calls(call_from, call_to)
        .with_pid(pid)
        .with_payload(Bytes::copy_from_slice(data))
}

pub fn disconnect(port: u8, call_from: &str, call_to: &str) -> Frame {
    Frame::new(FrameKind::Disconnect, port)
        .with_calls(call_from, call_to)
        .with_pid(PID_NO_L3)
}

/// Raw AX.25 frame. The port selector byte goes ahead of the frame bytes;
/// this is separate from the generic payload path.
pub fn send_raw(port: u8, call_from: &str, call_to: &str, ax25: &[u8]) -> Frame {
    let mut payload = BytesMut::with_capacity(1 + ax25.len());
    payload.put_u8(RAW_PORT_SELECTOR);
    payload.put_slice(ax25);
    Frame::new(FrameKind::Raw, port)
        .with_calls(call_from, call_to)
        .with_payload(payload.freeze())
}
