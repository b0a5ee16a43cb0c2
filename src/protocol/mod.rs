//! Protocol Module
//!
//! Defines the wire protocol spoken with the packet engine server.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────────────────────────────────┬─────────────────────────────┐
//! │           Header (36 bytes)          │     Payload (Len bytes)     │
//! └──────────────────────────────────────┴─────────────────────────────┘
//! ```
//!
//! ### Frame Kinds (selection)
//! - 'R': version query / response
//! - 'G', 'g': port information / port capabilities
//! - 'X', 'x': register / unregister callsign
//! - 'C', 'v', 'c', 'd': connect, connect via, connect with PID, disconnect
//! - 'D': connected data
//! - 'M', 'V': unproto, unproto via
//! - 'I', 'S', 'U', 'T', 'K': monitored traffic
//! - 'm', 'k': monitoring and raw reception toggles

mod kind;
mod frame;
mod codec;
pub mod payload;
pub mod request;

pub use kind::{FrameKind, ReceiveLength};
pub use frame::Frame;
pub use codec::{
    encode, encode_frame, decode_frame, write_frame, FrameDecoder, FrameReader,
    CALLSIGN_WIDTH, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use payload::{HeardCall, HeardTimestamp, MonitorRecord, PortCaps, VersionInfo};
