//! Frame definitions
//!
//! A frame is one complete protocol message: the fixed header fields plus
//! the payload bytes declared by the header's length field.

use bytes::Bytes;

use super::kind::FrameKind;
use super::payload::{split_monitor_data, MonitorRecord};

/// One decoded or to-be-encoded protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind
    pub kind: FrameKind,

    /// Radio port number (0-based)
    pub port: u8,

    /// Protocol id byte (0 when not meaningful for the kind)
    pub pid: u8,

    /// Source callsign, padding removed
    pub call_from: String,

    /// Destination callsign, padding removed
    pub call_to: String,

    /// Payload, exactly as long as the header declared
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame with no callsigns, pid or payload
    pub fn new(kind: FrameKind, port: u8) -> Self {
        Self {
            kind,
            port,
            pid: 0,
            call_from: String::new(),
            call_to: String::new(),
            payload: Bytes::new(),
        }
    }

    pub fn with_calls(mut self, call_from: impl Into<String>, call_to: impl Into<String>) -> Self {
        self.call_from = call_from.into();
        self.call_to = call_to.into();
        self
    }

    pub fn with_pid(mut self, pid: u8) -> Self {
        self.pid = pid;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The total wire size of this frame (header + payload)
    pub fn wire_size(&self) -> usize {
        super::codec::HEADER_SIZE + self.payload.len()
    }

    /// Text record and trailing data of a monitor frame.
    ///
    /// Returns `None` for kinds that do not report monitored traffic. The
    /// binary remainder of supervisory frames is available here even though
    /// no event carries it.
    pub fn monitor_record(&self) -> Option<MonitorRecord> {
        self.kind
            .is_monitor()
            .then(|| split_monitor_data(&self.payload))
    }

    /// Payload interpreted as text up to the first NUL
    pub fn payload_text(&self) -> String {
        let end = self
            .payload
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.payload.len());
        String::from_utf8_lossy(&self.payload[..end]).into_owned()
    }
}
