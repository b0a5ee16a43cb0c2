//! Shared test fixtures: a scripted fake server and an event recorder.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use packet_engine::config::Config;
use packet_engine::event::DisconnectReason;
use packet_engine::handler::{HandlerResult, ReceiveHandler};
use packet_engine::protocol::{
    write_frame, Frame, FrameKind, FrameReader, HeardCall, PortCaps, VersionInfo,
    DEFAULT_MAX_PAYLOAD,
};

pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// Fake Server
// =============================================================================

/// Server side of one accepted connection
pub struct ServerConn {
    reader: FrameReader<TcpStream>,
    writer: TcpStream,
    log: Arc<Mutex<Vec<Frame>>>,
}

impl ServerConn {
    /// Next frame from the engine, or `None` once it disconnects
    pub fn read(&mut self) -> Option<Frame> {
        let frame = self.reader.read_frame().ok().flatten()?;
        self.log.lock().unwrap().push(frame.clone());
        Some(frame)
    }

    pub fn expect(&mut self, kind: FrameKind) -> Frame {
        let frame = self
            .read()
            .unwrap_or_else(|| panic!("engine disconnected while expecting {}", kind));
        assert_eq!(frame.kind, kind, "unexpected frame {:?}", frame);
        frame
    }

    pub fn send(&mut self, frame: Frame) {
        write_frame(&mut self.writer, &frame).unwrap();
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        use std::io::Write;
        self.writer.write_all(bytes).unwrap();
    }

    /// Answer the startup queries for a server with `ports`
    pub fn serve_handshake(&mut self, ports: &[&str]) {
        self.expect(FrameKind::Version);
        self.send(version_frame(2000, 78));
        self.expect(FrameKind::PortInfo);
        self.send(port_info_frame(ports));
        for index in 0..ports.len() {
            let query = self.expect(FrameKind::PortCaps);
            assert_eq!(usize::from(query.port), index);
            self.send(caps_frame(query.port));
        }
    }

    /// Read until the engine goes away
    pub fn drain(&mut self) {
        while self.read().is_some() {}
    }
}

/// A one-connection server running `script` on its own thread
pub struct FakeServer {
    pub addr: SocketAddr,
    pub log: Arc<Mutex<Vec<Frame>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeServer {
    pub fn start<F>(script: F) -> Self
    where
        F: FnOnce(&mut ServerConn) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let log: Arc<Mutex<Vec<Frame>>> = Arc::default();
        let server_log = Arc::clone(&log);

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut conn = ServerConn {
                reader: FrameReader::new(stream.try_clone().unwrap(), DEFAULT_MAX_PAYLOAD),
                writer: stream,
                log: server_log,
            };
            script(&mut conn);
        });

        Self {
            addr,
            log,
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> Config {
        Config::builder()
            .host("127.0.0.1")
            .port(self.addr.port())
            .connect_timeout_ms(2000)
            .ready_timeout_ms(5000)
            .build()
    }

    /// Wait for the script to finish, re-raising its panics. Returns every
    /// frame the server received.
    pub fn join(mut self) -> Vec<Frame> {
        if let Some(handle) = self.handle.take() {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
        self.log.lock().unwrap().clone()
    }

    pub fn received(&self, kind: FrameKind) -> Vec<Frame> {
        of_kind(&self.log.lock().unwrap(), kind)
    }
}

pub fn of_kind(frames: &[Frame], kind: FrameKind) -> Vec<Frame> {
    frames.iter().filter(|f| f.kind == kind).cloned().collect()
}

// =============================================================================
// Server Responses
// =============================================================================

pub fn version_frame(major: u16, minor: u16) -> Frame {
    let mut payload = vec![0u8; 8];
    payload[..2].copy_from_slice(&major.to_le_bytes());
    payload[4..6].copy_from_slice(&minor.to_le_bytes());
    Frame::new(FrameKind::Version, 0).with_payload(payload)
}

pub fn port_info_frame(ports: &[&str]) -> Frame {
    let mut text = format!("{};", ports.len());
    for port in ports {
        text.push_str(port);
        text.push(';');
    }
    text.push('\0');
    Frame::new(FrameKind::PortInfo, 0).with_payload(text.into_bytes())
}

pub fn caps_frame(port: u8) -> Frame {
    let payload = vec![0, 0, 30, 10, 63, 10, 7, port, 0, 0, 0, 0];
    Frame::new(FrameKind::PortCaps, port).with_payload(payload)
}

pub fn data_frame(port: u8, from: &str, to: &str, text: &str) -> Frame {
    Frame::new(FrameKind::Data, port)
        .with_calls(from, to)
        .with_pid(0xF0)
        .with_payload(text.as_bytes().to_vec())
}

// =============================================================================
// Event Recorder
// =============================================================================

/// Turns callbacks into short strings on a channel
pub struct ChannelHandler {
    tx: Sender<String>,
}

impl ChannelHandler {
    pub fn new() -> (Arc<Self>, Receiver<String>) {
        let (tx, rx) = channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }

    pub fn sender(&self) -> Sender<String> {
        self.tx.clone()
    }

    fn emit(&self, text: String) -> HandlerResult {
        let _ = self.tx.send(text);
        Ok(())
    }
}

impl ReceiveHandler for ChannelHandler {
    fn version_info(&self, info: VersionInfo) -> HandlerResult {
        self.emit(format!("version {}", info))
    }

    fn callsign_registered(&self, callsign: &str, success: bool) -> HandlerResult {
        self.emit(format!("registered {} {}", callsign, success))
    }

    fn port_info(&self, ports: &[String]) -> HandlerResult {
        self.emit(format!("ports {}", ports.len()))
    }

    fn port_caps(&self, port: u8, _caps: &PortCaps) -> HandlerResult {
        self.emit(format!("caps {}", port))
    }

    fn callsign_heard_on_port(&self, port: u8, heard: Option<&HeardCall>) -> HandlerResult {
        let call = heard.map(|h| h.callsign.as_str()).unwrap_or("-");
        self.emit(format!("heard {} {}", port, call))
    }

    fn connection_received(
        &self,
        _port: u8,
        call_from: &str,
        call_to: &str,
        incoming: bool,
        _message: &str,
    ) -> HandlerResult {
        self.emit(format!("connection {}>{} incoming={}", call_from, call_to, incoming))
    }

    fn connected_data(&self, _port: u8, _from: &str, _to: &str, _pid: u8, data: &[u8]) -> HandlerResult {
        self.emit(format!("data {}", String::from_utf8_lossy(data)))
    }

    fn disconnected(&self, _port: u8, call_from: &str, call_to: &str, _message: &str) -> HandlerResult {
        self.emit(format!("disconnected {}>{}", call_from, call_to))
    }

    fn server_disconnected(&self, reason: &DisconnectReason) -> HandlerResult {
        let text = match reason {
            DisconnectReason::Requested => "requested",
            DisconnectReason::Closed => "closed",
            DisconnectReason::Transport(_) => "transport",
            DisconnectReason::Framing(_) => "framing",
        };
        self.emit(format!("server {}", text))
    }
}

/// Receive until `wanted` arrives, returning everything seen before it
pub fn wait_for(rx: &Receiver<String>, wanted: &str) -> Vec<String> {
    let mut seen = Vec::new();
    loop {
        match rx.recv_timeout(WAIT) {
            Ok(event) if event == wanted => return seen,
            Ok(event) => seen.push(event),
            Err(_) => panic!("timed out waiting for '{}', saw {:?}", wanted, seen),
        }
    }
}
