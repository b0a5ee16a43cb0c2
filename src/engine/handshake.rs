//! Startup handshake
//!
//! Tracks the responses to the initial queries and decides when the cached
//! server info is complete.
//!
//! ## Sequence
//! ```text
//!   [P login] ──► R ──► G ──► g(0) ──► g(1) ──► ... ──► g(n-1) ──► ready
//! ```
//! With no ports, readiness follows the port info response directly. Only
//! the first 256 ports are addressable, so caps are gathered for those.

use serde::Serialize;

use crate::event::Event;
use crate::protocol::{request, Frame, PortCaps, VersionInfo};

/// Server info gathered by the handshake. Read-only once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub version: VersionInfo,
    pub ports: Vec<String>,
    /// Capabilities by port index
    pub port_caps: Vec<PortCaps>,
}

/// Ports a caps query can address
const ADDRESSABLE_PORTS: usize = u8::MAX as usize + 1;

/// What the worker should do after observing an event
#[derive(Debug, PartialEq)]
pub(crate) enum Step {
    Wait,
    Send(Frame),
    Complete(ServerInfo),
}

#[derive(Debug, Default)]
pub(crate) struct Handshake {
    started: bool,
    done: bool,
    version: Option<VersionInfo>,
    ports: Option<Vec<String>>,
    caps: Vec<PortCaps>,
}

impl Handshake {
    /// Queries that open the handshake, after any login frame
    pub(crate) fn start(&mut self) -> [Frame; 2] {
        self.started = true;
        [request::ask_version(), request::ask_port_info()]
    }

    pub(crate) fn observe(&mut self, event: &Event) -> Step {
        if !self.started || self.done {
            return Step::Wait;
        }

        match event {
            Event::VersionInfo(info) if self.version.is_none() => {
                self.version = Some(*info);
            }
            Event::PortInfo(ports) if self.ports.is_none() => {
                self.ports = Some(ports.clone());
                if let Some(next) = self.next_caps_query() {
                    return Step::Send(next);
                }
            }
            Event::PortCaps { port, caps } => {
                if self.ports.is_none() {
                    return Step::Wait;
                }
                // Only the answer to the outstanding query counts
                if usize::from(*port) != self.caps.len() || self.caps.len() >= self.caps_wanted() {
                    return Step::Wait;
                }
                self.caps.push(*caps);
                if let Some(next) = self.next_caps_query() {
                    return Step::Send(next);
                }
            }
            _ => return Step::Wait,
        }

        self.try_complete()
    }

    fn caps_wanted(&self) -> usize {
        self.ports
            .as_ref()
            .map_or(0, |ports| ports.len().min(ADDRESSABLE_PORTS))
    }

    /// Query for the next port still missing caps, if any
    fn next_caps_query(&self) -> Option<Frame> {
        if self.caps.len() >= self.caps_wanted() {
            return None;
        }
        u8::try_from(self.caps.len()).ok().map(request::ask_port_caps)
    }

    fn try_complete(&mut self) -> Step {
        if self.caps.len() < self.caps_wanted() {
            return Step::Wait;
        }
        let (Some(version), Some(ports)) = (self.version, &self.ports) else {
            return Step::Wait;
        };
        self.done = true;
        Step::Complete(ServerInfo {
            version,
            ports: ports.clone(),
            port_caps: std::mem::take(&mut self.caps),
        })
    }
}
