//! Connection Registry
//!
//! Tracks every non-closed connection by triple and turns the generic
//! connection events of the handler chain into per-connection callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{
    Connection, ConnectionHandler, ConnectionState, DisconnectCause, IncomingPolicy, LinkKey,
    Triple,
};
use crate::error::{EngineError, Result};
use crate::event::DisconnectReason;
use crate::handler::{HandlerResult, ReceiveHandler};
use crate::network::FrameSink;
use crate::protocol::request;

/// Marker the server puts in a disconnect message when retries ran out
const RETRY_EXHAUSTED: &str = "RETRYOUT";

/// Registry of connected-mode sessions.
///
/// ## Concurrency:
/// - `connections`: short critical sections only; never held while calling
///   application code
/// - Lifecycle transitions from server frames happen on the receive worker;
///   `open`/`close`/`send_data` may be called from any thread
pub struct ConnectionRegistry {
    /// Where requests are written
    sink: Arc<dyn FrameSink>,

    /// Live connections. Closed connections are removed immediately.
    connections: Mutex<HashMap<LinkKey, Arc<Connection>>>,

    /// Admission for incoming connections; absent means reject all
    policy: RwLock<Option<Arc<dyn IncomingPolicy>>>,
}

impl ConnectionRegistry {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            connections: Mutex::new(HashMap::new()),
            policy: RwLock::new(None),
        }
    }

    /// Set or clear the admission policy for incoming connections
    pub fn set_incoming_policy(&self, policy: Option<Arc<dyn IncomingPolicy>>) {
        *self.policy.write() = policy;
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Open an outgoing connection.
    ///
    /// Returns as soon as the connect request is written; the connection
    /// becomes Open when the server confirms it.
    pub fn open(&self, triple: Triple, handler: Arc<dyn ConnectionHandler>) -> Result<Arc<Connection>> {
        self.open_via(triple, &[], handler)
    }

    /// Open an outgoing connection through digipeaters
    pub fn open_via(
        &self,
        triple: Triple,
        via: &[&str],
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<Arc<Connection>> {
        let frame = request::connect(triple.port, &triple.call_from, &triple.call_to, via, None)?;
        let key = triple.link_key();

        let conn = {
            let mut connections = self.connections.lock();
            if connections.get(&key).is_some_and(|c| is_live(c)) {
                return Err(EngineError::DuplicateConnection(triple));
            }
            let conn = Arc::new(Connection::new(
                triple,
                false,
                ConnectionState::Opening,
                handler,
                Arc::clone(&self.sink),
            ));
            connections.insert(key.clone(), Arc::clone(&conn));
            conn
        };

        if let Err(e) = self.sink.send_frame(&frame) {
            self.evict(&key, &conn);
            return Err(e);
        }
        tracing::debug!("Opening connection {}", conn.triple());
        Ok(conn)
    }

    /// Send data on a tracked, open connection
    pub fn send_data(&self, triple: &Triple, data: impl AsRef<[u8]>, pid: Option<u8>) -> Result<()> {
        match self.get(triple) {
            Some(conn) => conn.send_data(data, pid),
            None => Err(EngineError::InvalidState {
                triple: triple.clone(),
                state: ConnectionState::Closed,
            }),
        }
    }

    /// Close a tracked connection. A no-op for closing or untracked ones.
    pub fn close(&self, triple: &Triple) -> Result<()> {
        match self.get(triple) {
            Some(conn) => conn.close(),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn get(&self, triple: &Triple) -> Option<Arc<Connection>> {
        self.find(triple.port, &triple.call_from, &triple.call_to)
    }

    /// Snapshot of all tracked connections
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Live entry for the link; a Closed leftover counts as absent
    fn find(&self, port: u8, a: &str, b: &str) -> Option<Arc<Connection>> {
        self.connections
            .lock()
            .get(&LinkKey::new(port, a, b))
            .filter(|c| is_live(c))
            .cloned()
    }

    /// Remove `conn` if it is still the entry for `key`
    fn evict(&self, key: &LinkKey, conn: &Arc<Connection>) {
        let mut connections = self.connections.lock();
        if connections.get(key).is_some_and(|c| Arc::ptr_eq(c, conn)) {
            connections.remove(key);
        }
    }

    fn change_state(&self, conn: &Connection, to: ConnectionState) {
        let from = conn.transition(to);
        if from != to {
            tracing::debug!("Connection {}: {} -> {}", conn.triple(), from, to);
            conn.handler().state_changed(conn, from, to);
        }
    }

    /// Evict first: the triple is free before any application callback runs.
    fn finish(&self, conn: &Arc<Connection>, cause: DisconnectCause) {
        self.evict(&conn.triple().link_key(), conn);
        if conn.state() != ConnectionState::Closing {
            self.change_state(conn, ConnectionState::Closing);
        }
        self.change_state(conn, ConnectionState::Closed);
        conn.handler().disconnected(conn, cause);
    }

    fn admit(&self, triple: Triple) {
        let Some(policy) = self.policy.read().clone() else {
            tracing::debug!("Rejecting incoming connection {}: no policy", triple);
            return;
        };
        let Some(handler) = policy.accept(&triple) else {
            tracing::debug!("Rejecting incoming connection {}: declined", triple);
            return;
        };

        let key = triple.link_key();
        let conn = {
            let mut connections = self.connections.lock();
            if connections.get(&key).is_some_and(|c| is_live(c)) {
                tracing::warn!("Incoming connection {} raced an existing entry; dropped", triple);
                return;
            }
            let conn = Arc::new(Connection::new(
                triple,
                true,
                ConnectionState::Open,
                handler,
                Arc::clone(&self.sink),
            ));
            connections.insert(key, Arc::clone(&conn));
            conn
        };

        tracing::debug!("Accepted incoming connection {}", conn.triple());
        conn.handler().connected(&conn);
    }
}

fn is_live(conn: &Connection) -> bool {
    conn.state() != ConnectionState::Closed
}

fn untracked(what: &str, port: u8, call_from: &str, call_to: &str) {
    let violation = EngineError::ProtocolViolation(format!(
        "{} for untracked connection {}",
        what,
        Triple::new(port, call_from, call_to)
    ));
    tracing::warn!("Dropping frame: {}", violation);
}

impl ReceiveHandler for ConnectionRegistry {
    fn connection_received(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        _message: &str,
    ) -> HandlerResult {
        let existing = self.find(port, call_from, call_to);

        if incoming {
            match existing {
                Some(conn) => tracing::debug!(
                    "Ignoring incoming connect for tracked connection {} ({})",
                    conn.triple(),
                    conn.state()
                ),
                None => self.admit(Triple::new(port, call_from, call_to)),
            }
            return Ok(());
        }

        match existing {
            None => untracked("connection confirmation", port, call_from, call_to),
            Some(conn) if conn.state() == ConnectionState::Opening => {
                self.change_state(&conn, ConnectionState::Open);
                conn.handler().connected(&conn);
            }
            Some(conn) => tracing::debug!(
                "Ignoring connection confirmation for {} in state {}",
                conn.triple(),
                conn.state()
            ),
        }
        Ok(())
    }

    fn connected_data(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        pid: u8,
        data: &[u8],
    ) -> HandlerResult {
        match self.find(port, call_from, call_to) {
            None => untracked("data", port, call_from, call_to),
            Some(conn) => match conn.state() {
                ConnectionState::Open | ConnectionState::Closing => {
                    conn.handler().data_received(&conn, pid, data)
                }
                state => tracing::warn!(
                    "Dropping data for connection {} in state {}",
                    conn.triple(),
                    state
                ),
            },
        }
        Ok(())
    }

    fn disconnected(&self, port: u8, call_from: &str, call_to: &str, message: &str) -> HandlerResult {
        let Some(conn) = self.find(port, call_from, call_to) else {
            untracked("disconnect", port, call_from, call_to);
            return Ok(());
        };

        // The server sends a single disconnect frame whether it confirms our
        // request or reports the peer leaving; either way the link is down.
        let cause = if message.contains(RETRY_EXHAUSTED) {
            DisconnectCause::TimedOut
        } else if conn.state() == ConnectionState::Closing {
            DisconnectCause::Local
        } else {
            DisconnectCause::Remote
        };
        self.finish(&conn, cause);
        Ok(())
    }

    fn server_disconnected(&self, _reason: &DisconnectReason) -> HandlerResult {
        let orphaned: Vec<Arc<Connection>> = self.connections.lock().drain().map(|(_, c)| c).collect();
        for conn in orphaned {
            self.finish(&conn, DisconnectCause::ServerLost);
        }
        Ok(())
    }
}
