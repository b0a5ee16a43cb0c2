//! Frame output
//!
//! Every request leaves the process through a `FrameSink`.

use std::io::Write;
use std::net::{Shutdown, TcpStream};

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::error::{EngineError, Result};
use crate::protocol::{encode_frame, Frame};

/// Destination for outgoing frames. Safe to call from any thread.
pub trait FrameSink: Send + Sync {
    /// Encode and write one whole frame
    fn send_frame(&self, frame: &Frame) -> Result<()>;
}

/// Write half of the server stream.
///
/// Frames are encoded before the lock is taken and written with a single
/// `write_all` while holding it, so concurrent senders never interleave.
#[derive(Default)]
pub struct WireWriter {
    stream: Mutex<Option<TcpStream>>,
}

impl WireWriter {
    /// A writer with no stream attached; sends fail with `NotConnected`
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, stream: TcpStream) {
        *self.stream.lock() = Some(stream);
    }

    /// Detach and shut down the stream. Both directions are closed, which
    /// also wakes a reader blocked on the same socket.
    pub(crate) fn shutdown(&self) {
        if let Some(stream) = self.stream.lock().take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                tracing::debug!("Socket shutdown: {}", e);
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.stream.lock().is_some()
    }
}

impl FrameSink for WireWriter {
    fn send_frame(&self, frame: &Frame) -> Result<()> {
        let mut buf = BytesMut::with_capacity(frame.wire_size());
        encode_frame(frame, &mut buf)?;

        let mut guard = self.stream.lock();
        let stream = guard.as_mut().ok_or(EngineError::NotConnected)?;
        stream.write_all(&buf)?;
        stream.flush()?;
        tracing::trace!(
            "Sent frame {} port={} {}>{} len={}",
            frame.kind,
            frame.port,
            frame.call_from,
            frame.call_to,
            frame.payload.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for WireWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireWriter")
            .field("attached", &self.is_attached())
            .finish()
    }
}
