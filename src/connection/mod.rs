//! Connection Module
//!
//! Connected-mode sessions multiplexed over the single server stream.
//!
//! ## Lifecycle
//! ```text
//!   open() ──► Opening ──(C)──► Open ──close()──► Closing ──(d)──► Closed
//!                                 │                  ▲
//!                                 └──(d from peer)───┘
//! ```
//! A connection reaching Closed is evicted from the registry, freeing its
//! triple for reuse. Incoming connections start in Open once admitted.

mod registry;

pub use registry::ConnectionRegistry;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::network::FrameSink;
use crate::protocol::request::{self, PID_NO_L3};

// =============================================================================
// Triple
// =============================================================================

/// (port, call_from, call_to): the key of one logical connection.
///
/// For incoming connections `call_from` is always the remote station and
/// `call_to` the local one, exactly as the server reported them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub port: u8,
    pub call_from: String,
    pub call_to: String,
}

impl Triple {
    pub fn new(port: u8, call_from: impl Into<String>, call_to: impl Into<String>) -> Self {
        Self {
            port,
            call_from: call_from.into(),
            call_to: call_to.into(),
        }
    }

    /// Direction-independent key: the server may report either station first
    pub(crate) fn link_key(&self) -> LinkKey {
        LinkKey::new(self.port, &self.call_from, &self.call_to)
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}>{}", self.port, self.call_from, self.call_to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct LinkKey {
    port: u8,
    low: String,
    high: String,
}

impl LinkKey {
    pub(crate) fn new(port: u8, a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            port,
            low: low.to_string(),
            high: high.to_string(),
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Connect requested, awaiting confirmation
    Opening,
    /// Confirmed by the server
    Open,
    /// Disconnect requested locally, or announced by the peer
    Closing,
    /// Finished; no longer tracked
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Opening => "opening",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a connection came to be closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectCause {
    /// We asked for it and the server confirmed
    Local,
    /// The peer ended the connection
    Remote,
    /// The link layer gave up retrying
    TimedOut,
    /// The server session ended underneath the connection
    ServerLost,
}

// =============================================================================
// Application Callbacks
// =============================================================================

/// Application side of one connection. Every method defaults to a no-op.
///
/// Callbacks driven by server frames run on the engine's receive worker.
#[allow(unused_variables)]
pub trait ConnectionHandler: Send + Sync {
    /// The connection is open and can carry data
    fn connected(&self, conn: &Connection) {}

    fn data_received(&self, conn: &Connection, pid: u8, data: &[u8]) {}

    /// The connection has been closed and evicted from the registry
    fn disconnected(&self, conn: &Connection, cause: DisconnectCause) {}

    /// A server frame moved the connection between states
    fn state_changed(&self, conn: &Connection, from: ConnectionState, to: ConnectionState) {}
}

/// Admission of incoming connections.
///
/// Consulted with the candidate triple before any connection exists.
/// Returning a handler admits the connection; `None` rejects it silently.
pub trait IncomingPolicy: Send + Sync {
    fn accept(&self, candidate: &Triple) -> Option<Arc<dyn ConnectionHandler>>;
}

impl<F> IncomingPolicy for F
where
    F: Fn(&Triple) -> Option<Arc<dyn ConnectionHandler>> + Send + Sync,
{
    fn accept(&self, candidate: &Triple) -> Option<Arc<dyn ConnectionHandler>> {
        self(candidate)
    }
}

// =============================================================================
// Connection
// =============================================================================

/// One connected-mode session.
///
/// Shared between the registry, which drives its lifecycle, and the
/// application, which exchanges data over it.
pub struct Connection {
    triple: Triple,
    incoming: bool,
    state: Mutex<ConnectionState>,
    handler: Arc<dyn ConnectionHandler>,
    sink: Arc<dyn FrameSink>,
}

impl Connection {
    pub(crate) fn new(
        triple: Triple,
        incoming: bool,
        state: ConnectionState,
        handler: Arc<dyn ConnectionHandler>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            triple,
            incoming,
            state: Mutex::new(state),
            handler,
            sink,
        }
    }

    pub fn triple(&self) -> &Triple {
        &self.triple
    }

    pub fn port(&self) -> u8 {
        self.triple.port
    }

    pub fn call_from(&self) -> &str {
        &self.triple.call_from
    }

    pub fn call_to(&self) -> &str {
        &self.triple.call_to
    }

    /// True if the remote station initiated the connection
    pub fn incoming(&self) -> bool {
        self.incoming
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Our callsign on this connection
    pub fn local_call(&self) -> &str {
        if self.incoming {
            &self.triple.call_to
        } else {
            &self.triple.call_from
        }
    }

    /// The other station's callsign
    pub fn remote_call(&self) -> &str {
        if self.incoming {
            &self.triple.call_from
        } else {
            &self.triple.call_to
        }
    }

    /// The application handler supplied when the connection was created
    pub fn handler(&self) -> &Arc<dyn ConnectionHandler> {
        &self.handler
    }

    /// Send data on the connection. Text goes out as UTF-8; bytes unchanged.
    pub fn send_data(&self, data: impl AsRef<[u8]>, pid: Option<u8>) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(EngineError::InvalidState {
                triple: self.triple.clone(),
                state,
            });
        }
        let frame = request::send_data(
            self.port(),
            self.local_call(),
            self.remote_call(),
            pid.unwrap_or(PID_NO_L3),
            data.as_ref(),
        );
        self.sink.send_frame(&frame)
    }

    /// Ask the server to disconnect. A no-op if already closing or closed.
    ///
    /// If the request cannot be written the previous state is restored, so
    /// the close can be retried.
    pub fn close(&self) -> Result<()> {
        let previous = {
            let mut state = self.state.lock();
            if matches!(*state, ConnectionState::Closing | ConnectionState::Closed) {
                return Ok(());
            }
            std::mem::replace(&mut *state, ConnectionState::Closing)
        };
        tracing::debug!("Closing connection {}", self.triple);
        let frame = request::disconnect(self.port(), self.local_call(), self.remote_call());
        if let Err(e) = self.sink.send_frame(&frame) {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closing {
                *state = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Move to `to`, returning the previous state
    pub(crate) fn transition(&self, to: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut *self.state.lock(), to)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("triple", &self.triple)
            .field("incoming", &self.incoming)
            .field("state", &self.state())
            .finish()
    }
}
