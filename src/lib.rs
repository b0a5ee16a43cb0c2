//! # packet-engine
//!
//! A client for packet radio engine servers speaking the AGW-style TCP
//! protocol, with:
//! - A binary frame codec for the fixed 36 byte header
//! - One background worker decoding frames into typed events
//! - An ordered handler chain with per-handler failure isolation
//! - A registry of connected-mode sessions and their lifecycles
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application threads                          │
//! │        (requests: unproto, connect, data, queries)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ WireWriter (one lock, whole frames)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Server TCP stream                           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ ReceiveLoop (worker thread)
//!                       ▼
//!               ┌──────────────┐
//!               │ Frame → Event│
//!               └──────┬───────┘
//!                      ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │ HandlerChain: logging → registry → monitor → app │
//!   └──────────────────────┬───────────────────────────┘
//!                          ▼
//!                  ┌───────────────┐
//!                  │  Connection   │
//!                  │  callbacks    │
//!                  └───────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod event;
pub mod handler;
pub mod connection;
pub mod network;
pub mod signal;
pub mod engine;
pub mod app;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EngineError, Result};
pub use config::Config;
pub use engine::{Engine, ServerInfo};
pub use app::Application;
pub use event::{DisconnectReason, Event};
pub use handler::{HandlerChain, ReceiveHandler};
pub use connection::{Connection, ConnectionHandler, ConnectionRegistry, ConnectionState, Triple};
pub use signal::ReadySignal;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of packet-engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
