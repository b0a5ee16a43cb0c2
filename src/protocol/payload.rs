//! Payload layouts
//!
//! Typed views of the payloads carried by server responses, and builders
//! for the structured payloads the client sends.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::codec::{put_callsign, CALLSIGN_WIDTH};
use crate::error::{EngineError, Result};

/// Most digipeaters an AX.25 address field can carry
pub const MAX_VIA: usize = 8;

/// Width of each login field
pub const LOGIN_FIELD_WIDTH: usize = 255;

const PORT_CAPS_LEN: usize = 12;
const SYSTEMTIME_LEN: usize = 16;

// =============================================================================
// Server Records
// =============================================================================

/// Server version, from the `R` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u16,
    pub minor: u16,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Capabilities of one port, from the `g` response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCaps {
    pub baud_rate: u8,
    /// Traffic level if the port is in autoupdate mode
    pub traffic_level: u8,
    pub tx_delay: u8,
    pub tx_tail: u8,
    pub persist: u8,
    pub slot_time: u8,
    pub max_frame: u8,
    pub active_connections: u8,
    /// Bytes received in the last two minutes
    pub bytes_received: u32,
}

/// Wall-clock timestamp in the Windows SYSTEMTIME layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeardTimestamp {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub millis: u16,
}

/// One station heard on a port, from an `H` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeardCall {
    pub callsign: String,
    pub first_heard: String,
    pub first_heard_ts: Option<HeardTimestamp>,
    pub last_heard: String,
    pub last_heard_ts: Option<HeardTimestamp>,
}

/// Text record and trailing data of a monitored frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRecord {
    /// Human-readable header line, when one was present
    pub text: Option<String>,
    /// Data following the header line
    pub data: Bytes,
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Parse the 8 byte version payload: major and minor, each u16 LE padded to 4
pub fn parse_version(payload: &[u8]) -> Result<VersionInfo> {
    expect_len("version", payload, 8)?;
    Ok(VersionInfo {
        major: u16::from_le_bytes([payload[0], payload[1]]),
        minor: u16::from_le_bytes([payload[4], payload[5]]),
    })
}

/// Parse the port information text into port descriptions.
///
/// Some servers send a buffer with garbage after the first NUL, so only the
/// text before it is used. The leading field is the port count.
pub fn parse_port_info(payload: &[u8]) -> Vec<String> {
    let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    let text = String::from_utf8_lossy(&payload[..end]);
    text.split(';')
        .skip(1)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a 12 byte port capabilities record
pub fn parse_port_caps(payload: &[u8]) -> Result<PortCaps> {
    expect_len("port capabilities", payload, PORT_CAPS_LEN)?;
    Ok(PortCaps {
        baud_rate: payload[0],
        traffic_level: payload[1],
        tx_delay: payload[2],
        tx_tail: payload[3],
        persist: payload[4],
        slot_time: payload[5],
        max_frame: payload[6],
        active_connections: payload[7],
        bytes_received: u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]),
    })
}

/// Parse a 4 byte little-endian count
pub fn parse_count(payload: &[u8]) -> Result<u32> {
    expect_len("frame count", payload, 4)?;
    Ok(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

/// Parse a heard-station record.
///
/// Returns `None` for empty records (servers pad the list with them) and for
/// records whose text cannot be understood.
pub fn parse_heard(payload: &[u8]) -> Option<HeardCall> {
    let split = payload.iter().position(|&b| b == 0);
    let (text, rest) = match split {
        Some(i) => (&payload[..i], &payload[i + 1..]),
        None => (payload, &[][..]),
    };
    let (callsign, first_heard, last_heard) = parse_heard_text(text)?;
    let (first_heard_ts, last_heard_ts) = if rest.len() >= SYSTEMTIME_LEN * 2 {
        parse_heard_timestamps(rest).unzip()
    } else {
        (None, None)
    };
    Some(HeardCall {
        callsign,
        first_heard,
        first_heard_ts,
        last_heard,
        last_heard_ts,
    })
}

fn parse_heard_text(text: &[u8]) -> Option<(String, String, String)> {
    const MIN_VIABLE_LEN: usize = "ID 615 925".len();

    let text = std::str::from_utf8(text).ok()?;
    if text.len() < MIN_VIABLE_LEN {
        return None;
    }

    // Callsign plus two timestamps of equal part count: always an odd total.
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 3 || parts.len() % 2 == 0 {
        return None;
    }

    let mut call_parts = parts[0].split('-');
    let base = call_parts.next()?;
    if base.is_empty() || !base.chars().all(char::is_alphanumeric) {
        return None;
    }
    if let Some(ssid) = call_parts.next() {
        match ssid.parse::<u8>() {
            Ok(n) if n <= 15 && ssid.chars().all(|c| c.is_ascii_digit()) => {}
            _ => return None,
        }
    }
    if call_parts.next().is_some() {
        return None;
    }

    let stamps = &parts[1..];
    let (first, last) = stamps.split_at(stamps.len() / 2);
    Some((parts[0].to_string(), first.join(" "), last.join(" ")))
}

fn parse_heard_timestamps(buf: &[u8]) -> Option<(HeardTimestamp, HeardTimestamp)> {
    let expected = SYSTEMTIME_LEN * 2;
    if buf.len() == expected {
        let pair = systemtime_pair(buf, 0);
        // Older servers send the right size but all zeros.
        if pair.0.year == 0 && pair.1.year == 0 {
            return None;
        }
        return plausible(pair);
    }

    // Some servers put extra NULs before the timestamps; try the tail first.
    plausible(systemtime_pair(buf, buf.len() - expected))
        .or_else(|| plausible(systemtime_pair(buf, 0)))
}

fn plausible(pair: (HeardTimestamp, HeardTimestamp)) -> Option<(HeardTimestamp, HeardTimestamp)> {
    let ok = |ts: &HeardTimestamp| ts.year > 2000 && ts.year < 2200;
    (ok(&pair.0) && ok(&pair.1)).then_some(pair)
}

fn systemtime_pair(buf: &[u8], offset: usize) -> (HeardTimestamp, HeardTimestamp) {
    (
        systemtime_at(buf, offset),
        systemtime_at(buf, offset + SYSTEMTIME_LEN),
    )
}

// SYSTEMTIME: year, month, day-of-week (skipped), day, hour, minute, second, millis
fn systemtime_at(buf: &[u8], offset: usize) -> HeardTimestamp {
    let word = |i: usize| u16::from_le_bytes([buf[offset + i * 2], buf[offset + i * 2 + 1]]);
    HeardTimestamp {
        year: word(0),
        month: word(1),
        day: word(3),
        hour: word(4),
        minute: word(5),
        second: word(6),
        millis: word(7),
    }
}

/// Split a monitor payload into its header line and trailing data.
///
/// The header line ends at the first CR. When it declares ` Len=N `, the
/// data is cut to N bytes; otherwise all remaining bytes are returned.
pub fn split_monitor_data(payload: &Bytes) -> MonitorRecord {
    let Some(cr) = payload.iter().position(|&b| b == b'\r') else {
        return MonitorRecord {
            text: None,
            data: payload.clone(),
        };
    };

    let text = String::from_utf8_lossy(&payload[..cr]).into_owned();
    let mut data = payload.slice(cr + 1..);
    if let Some(len) = declared_len(&text) {
        data.truncate(len);
    }
    MonitorRecord {
        text: Some(text),
        data,
    }
}

fn declared_len(text: &str) -> Option<usize> {
    let start = text.find(" Len=")? + " Len=".len();
    let digits: &str = &text[start..];
    let end = digits.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 || !digits[end..].starts_with(' ') {
        return None;
    }
    digits[..end].parse().ok()
}

fn expect_len(what: &str, payload: &[u8], len: usize) -> Result<()> {
    if payload.len() != len {
        return Err(EngineError::ProtocolViolation(format!(
            "{} payload is {} bytes, expected {}",
            what,
            payload.len(),
            len
        )));
    }
    Ok(())
}

// =============================================================================
// Request Payloads
// =============================================================================

/// Encode a via path: count byte followed by NUL padded callsigns
pub fn encode_via_list(via: &[&str]) -> Result<BytesMut> {
    if via.len() > MAX_VIA {
        return Err(EngineError::Format(format!(
            "{} via callsigns given (max {})",
            via.len(),
            MAX_VIA
        )));
    }
    let mut buf = BytesMut::with_capacity(1 + via.len() * CALLSIGN_WIDTH);
    buf.put_u8(via.len() as u8);
    for call in via {
        put_callsign(&mut buf, call)?;
    }
    Ok(buf)
}

/// Encode the login payload: two NUL padded 255 byte fields
pub fn encode_login(user: &[u8], password: &[u8]) -> Result<Bytes> {
    for (name, value) in [("user id", user), ("password", password)] {
        if value.len() > LOGIN_FIELD_WIDTH {
            return Err(EngineError::Format(format!(
                "{} is {} bytes (max {})",
                name,
                value.len(),
                LOGIN_FIELD_WIDTH
            )));
        }
    }
    let mut buf = BytesMut::with_capacity(LOGIN_FIELD_WIDTH * 2);
    buf.put_slice(user);
    buf.put_bytes(0, LOGIN_FIELD_WIDTH - user.len());
    buf.put_slice(password);
    buf.put_bytes(0, LOGIN_FIELD_WIDTH - password.len());
    Ok(buf.freeze())
}
