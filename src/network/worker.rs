//! Receive Loop
//!
//! Reads frames from the server until the session ends.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::EngineError;
use crate::event::DisconnectReason;
use crate::protocol::{Frame, FrameReader};

/// Read half of the server stream, owned by the worker thread
pub(crate) struct ReceiveLoop {
    /// Frame reader over the stream (buffers partial reads)
    reader: FrameReader<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl ReceiveLoop {
    pub(crate) fn new(stream: TcpStream, max_payload: usize) -> Self {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            reader: FrameReader::new(stream, max_payload),
            peer_addr,
        }
    }

    /// Hand every frame to `on_frame` until the stream ends (blocking).
    ///
    /// `stop` is checked after each frame and after a failed read, so a
    /// requested shutdown is reported as such rather than as a transport
    /// error caused by closing the socket.
    pub(crate) fn run(&mut self, stop: &AtomicBool, mut on_frame: impl FnMut(Frame)) -> DisconnectReason {
        tracing::debug!("Receiving from {}", self.peer_addr);

        loop {
            let result = self.reader.read_frame();
            if stop.load(Ordering::Acquire) {
                return DisconnectReason::Requested;
            }

            match result {
                Ok(Some(frame)) => {
                    tracing::trace!(
                        "Received frame {} port={} {}>{} len={}",
                        frame.kind,
                        frame.port,
                        frame.call_from,
                        frame.call_to,
                        frame.payload.len()
                    );
                    on_frame(frame);
                    if stop.load(Ordering::Acquire) {
                        return DisconnectReason::Requested;
                    }
                }
                Ok(None) => {
                    tracing::debug!("Server {} closed the stream", self.peer_addr);
                    return DisconnectReason::Closed;
                }
                Err(EngineError::Io(ref e))
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    tracing::debug!("Connection to {} reset", self.peer_addr);
                    return DisconnectReason::Closed;
                }
                Err(EngineError::Io(e)) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return DisconnectReason::Transport(e.to_string());
                }
                Err(e) => {
                    // The stream cannot be resynchronized after a bad header.
                    tracing::error!("Fatal framing error from {}: {}", self.peer_addr, e);
                    return DisconnectReason::Framing(e.to_string());
                }
            }
        }
    }
}
