//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Every frame is a 36 byte header followed by the payload.
//! ```text
//! ┌──────────┬──────────┬─────────┬───────────────┬───────────────┬──────────┬──────────┐
//! │ Port (4) │ Kind (2) │ PID (2) │ CallFrom (10) │  CallTo (10)  │ Len (4)  │ Rsvd (4) │
//! └──────────┴──────────┴─────────┴───────────────┴───────────────┴──────────┴──────────┘
//! ```
//! - Port: port number in the first byte, remaining bytes zero
//! - Kind: ASCII kind code in the first byte
//! - PID: protocol id in the first byte
//! - Callsigns: NUL padded, at most 10 bytes
//! - Len: payload length, little-endian

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Frame, FrameKind};
use crate::error::{EngineError, Result};

/// Header size in bytes
pub const HEADER_SIZE: usize = 36;

/// Width of each callsign field
pub const CALLSIGN_WIDTH: usize = 10;

/// Default maximum payload size accepted by the decoder (64 KB)
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

const KIND_OFFSET: usize = 4;
const PID_OFFSET: usize = 6;
const CALL_FROM_OFFSET: usize = 8;
const CALL_TO_OFFSET: usize = CALL_FROM_OFFSET + CALLSIGN_WIDTH;
const LEN_OFFSET: usize = CALL_TO_OFFSET + CALLSIGN_WIDTH;

const READ_CHUNK_SIZE: usize = 4096;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a frame from its parts
pub fn encode(
    kind: FrameKind,
    port: u8,
    call_from: &str,
    call_to: &str,
    pid: u8,
    payload: &[u8],
) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_header(kind, port, call_from, call_to, pid, payload.len(), &mut dst)?;
    dst.put_slice(payload);
    Ok(dst.freeze())
}

/// Encode a frame, appending header and payload to `dst`
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    encode_header(
        frame.kind,
        frame.port,
        &frame.call_from,
        &frame.call_to,
        frame.pid,
        frame.payload.len(),
        dst,
    )?;
    dst.put_slice(&frame.payload);
    Ok(())
}

fn encode_header(
    kind: FrameKind,
    port: u8,
    call_from: &str,
    call_to: &str,
    pid: u8,
    payload_len: usize,
    dst: &mut BytesMut,
) -> Result<()> {
    let payload_len = u32::try_from(payload_len).map_err(|_| {
        EngineError::Format(format!("payload of {} bytes does not fit the length field", payload_len))
    })?;

    dst.reserve(HEADER_SIZE + payload_len as usize);
    dst.put_u8(port);
    dst.put_bytes(0, 3);
    dst.put_u8(kind.code());
    dst.put_u8(0);
    dst.put_u8(pid);
    dst.put_u8(0);
    put_callsign(dst, call_from)?;
    put_callsign(dst, call_to)?;
    dst.put_u32_le(payload_len);
    dst.put_bytes(0, 4);
    Ok(())
}

/// Append a callsign padded with NULs to the fixed field width.
///
/// NULs and trailing spaces are rejected: `parse_callsign` strips both, so
/// such a callsign would not survive a round trip.
pub fn put_callsign(dst: &mut BytesMut, call: &str) -> Result<()> {
    let bytes = call.as_bytes();
    if bytes.len() > CALLSIGN_WIDTH {
        return Err(EngineError::Format(format!(
            "callsign '{}' is {} bytes (max {})",
            call,
            bytes.len(),
            CALLSIGN_WIDTH
        )));
    }
    if bytes.contains(&0) || call.ends_with(' ') {
        return Err(EngineError::Format(format!(
            "callsign '{}' has a NUL or trailing space",
            call.escape_debug()
        )));
    }
    dst.put_slice(bytes);
    dst.put_bytes(0, CALLSIGN_WIDTH - bytes.len());
    Ok(())
}

/// Read a padded callsign field: text up to the first NUL, trailing spaces removed
pub fn parse_callsign(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end])
        .trim_end_matches(' ')
        .to_string()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one frame from the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = u32::from_le_bytes([
        src[LEN_OFFSET],
        src[LEN_OFFSET + 1],
        src[LEN_OFFSET + 2],
        src[LEN_OFFSET + 3],
    ]) as usize;

    if payload_len > max_payload {
        return Err(EngineError::Framing(format!(
            "declared payload of {} bytes exceeds limit of {}",
            payload_len, max_payload
        )));
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let port = src[0];
    let kind = FrameKind::from_code(src[KIND_OFFSET]);
    let pid = src[PID_OFFSET];
    let call_from = parse_callsign(&src[CALL_FROM_OFFSET..CALL_TO_OFFSET]);
    let call_to = parse_callsign(&src[CALL_TO_OFFSET..LEN_OFFSET]);

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame {
        kind,
        port,
        pid,
        call_from,
        call_to,
        payload,
    }))
}

/// Incremental frame decoder.
///
/// Bytes may be fed in arbitrary pieces; frames come out once their header
/// and full payload have arrived. After a framing error the decoder stays
/// failed: there is no way to find the next header boundary.
pub struct FrameDecoder {
    buf: BytesMut,
    max_payload: usize,
    failed: Option<String>,
}

impl FrameDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            max_payload,
            failed: None,
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(reason) = &self.failed {
            return Err(EngineError::Framing(reason.clone()));
        }
        match decode_frame(&mut self.buf, self.max_payload) {
            Err(EngineError::Framing(reason)) => {
                self.failed = Some(reason.clone());
                Err(EngineError::Framing(reason))
            }
            other => other,
        }
    }

    /// Number of buffered bytes not yet returned as frames
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_failed(&self) -> bool {
        self.failed.is_some()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<R> {
    inner: R,
    decoder: FrameDecoder,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, max_payload: usize) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(max_payload),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` on a clean end of stream between frames. An end of
    /// stream in the middle of a frame is an `UnexpectedEof` I/O error.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            if read == 0 {
                if self.decoder.buffered() == 0 {
                    return Ok(None);
                }
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended inside a frame ({} bytes buffered)", self.decoder.buffered()),
                )
                .into());
            }

            self.decoder.feed(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

/// Write a frame to a stream
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<()> {
    let mut buf = BytesMut::with_capacity(frame.wire_size());
    encode_frame(frame, &mut buf)?;
    writer.write_all(&buf)?;
    writer.flush()?;
    Ok(())
}
