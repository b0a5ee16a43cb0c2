//! Error types for the packet engine
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::connection::{ConnectionState, Triple};

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Unified error type for packet engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Format Errors
    // -------------------------------------------------------------------------
    /// Malformed header or length field while decoding. The stream that
    /// produced it cannot be resynchronized.
    #[error("Framing error: {0}")]
    Framing(String),

    /// A value could not be encoded into the fixed frame layout.
    #[error("Format error: {0}")]
    Format(String),

    /// A well-formed frame that makes no sense in the current context.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    #[error("Connection already active for {0}")]
    DuplicateConnection(Triple),

    #[error("Connection {triple} is {state}, not open")]
    InvalidState {
        triple: Triple,
        state: ConnectionState,
    },

    #[error("Callsign not registered: {0}")]
    CallsignNotRegistered(String),

    // -------------------------------------------------------------------------
    // Engine Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Server info not available before the handshake completes")]
    NotReady,

    #[error("Not connected to server")]
    NotConnected,

    #[error("Already connected to server")]
    AlreadyConnected,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
