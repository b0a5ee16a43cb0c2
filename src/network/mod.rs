//! Network Module
//!
//! The single TCP session with the server.
//!
//! ## Architecture
//! - `WireWriter`: write half, one lock serializing whole frames
//! - `ReceiveLoop`: read half, owned by the engine's worker thread
//! - `FrameSink`: the seam request producers write through, so
//!   connection bookkeeping can be exercised without a socket

mod sink;
mod worker;

pub use sink::{FrameSink, WireWriter};
pub(crate) use worker::ReceiveLoop;
