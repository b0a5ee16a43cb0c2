//! Engine Module
//!
//! The client engine that owns the server session.
//!
//! ## Responsibilities
//! - Open the TCP session and run the receive worker
//! - Perform the startup handshake and publish the cached server info
//! - Serialize outgoing requests onto the single stream
//! - Track registered callsigns and the monitoring/raw toggles

mod handshake;

pub use handshake::ServerInfo;

use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::connection::ConnectionRegistry;
use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::handler::HandlerChain;
use crate::network::{FrameSink, ReceiveLoop, WireWriter};
use crate::protocol::{request, Frame, PortCaps, VersionInfo};
use crate::signal::ReadySignal;
use handshake::{Handshake, Step};

/// State shared between the engine and its receive worker
struct Session {
    /// Write half of the stream; also the sink handed to registries
    writer: Arc<WireWriter>,

    /// Armed once the handshake completes
    ready: ReadySignal,

    /// Handshake results, published once
    info: OnceLock<ServerInfo>,

    handshake: Mutex<Handshake>,

    /// Callsigns the server confirmed
    registered: Mutex<HashSet<String>>,

    /// Set by `disconnect_from_server`, read by the worker
    stopping: AtomicBool,

    /// True while the session is live
    connected: AtomicBool,

    /// Receive worker thread, once spawned
    worker_id: OnceLock<ThreadId>,

    /// Armed when the worker has delivered its last callback
    exited: ReadySignal,
}

impl Session {
    /// Decode, record, dispatch, then advance the handshake.
    ///
    /// Handshake responses reach the chain before readiness is armed, so
    /// readiness listeners never run ahead of the handlers.
    fn on_frame(&self, frame: Frame, chain: &HandlerChain) {
        let event = match Event::from_frame(&frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Dropping frame {} on port {}: {}", frame.kind, frame.port, e);
                return;
            }
        };

        if let Event::CallsignRegistered { callsign, success } = &event {
            if *success {
                self.registered.lock().insert(callsign.clone());
            } else {
                tracing::warn!("Server refused callsign {}", callsign);
            }
        }

        chain.dispatch(&event);

        let step = self.handshake.lock().observe(&event);
        match step {
            Step::Wait => {}
            Step::Send(frame) => {
                if let Err(e) = self.writer.send_frame(&frame) {
                    tracing::warn!("Handshake request failed: {}", e);
                }
            }
            Step::Complete(info) => {
                tracing::info!(
                    "Server ready: version {}, {} port(s)",
                    info.version,
                    info.ports.len()
                );
                // Published once per engine; a second handshake cannot happen.
                let _ = self.info.set(info);
                self.ready.arm();
            }
        }
    }
}

/// Client engine for one server session
///
/// ## Threading:
/// - One worker thread per session runs every handler callback, in frame
///   arrival order
/// - Request methods may be called from any thread; frames are written
///   whole under the writer's lock
/// - `disconnect_from_server` joins the worker, after which no callback runs
///
/// An engine carries a single session. The handler chain moves into the
/// worker on connect, so reconnecting means creating a new engine.
pub struct Engine {
    config: Config,

    session: Arc<Session>,

    /// Chain to hand to the worker; taken on connect
    chain: Mutex<Option<HandlerChain>>,

    /// Receive worker of the live session
    worker: Mutex<Option<JoinHandle<()>>>,

    /// Set on the first connect attempt
    started: AtomicBool,

    monitoring: Mutex<bool>,
    raw: Mutex<bool>,
}

impl Engine {
    const WORKER_NAME: &'static str = "pe-receive";

    /// Create an engine. Nothing is opened until `connect_to_server`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            session: Arc::new(Session {
                writer: Arc::new(WireWriter::new()),
                ready: ReadySignal::new(),
                info: OnceLock::new(),
                handshake: Mutex::new(Handshake::default()),
                registered: Mutex::new(HashSet::new()),
                stopping: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                worker_id: OnceLock::new(),
                exited: ReadySignal::new(),
            }),
            chain: Mutex::new(None),
            worker: Mutex::new(None),
            started: AtomicBool::new(false),
            monitoring: Mutex::new(false),
            raw: Mutex::new(false),
        })
    }

    /// Install the handler chain. Fails once connecting has begun.
    pub fn set_handlers(&self, chain: HandlerChain) -> Result<()> {
        if self.started.load(Ordering::Acquire) {
            return Err(EngineError::AlreadyConnected);
        }
        *self.chain.lock() = Some(chain);
        Ok(())
    }

    /// A connection registry writing through this engine's stream.
    ///
    /// Add it to the handler chain before connecting.
    pub fn connection_registry(&self) -> Arc<ConnectionRegistry> {
        let sink: Arc<dyn FrameSink> = self.session.writer.clone();
        Arc::new(ConnectionRegistry::new(sink))
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Connect to the server named in the config
    pub fn connect_to_server(&self) -> Result<()> {
        let host = self.config.host.clone();
        self.connect_to(&host, self.config.port)
    }

    /// Connect to `host:port`, start the worker and send the handshake.
    ///
    /// Returns once the handshake requests are written. Readiness follows
    /// asynchronously; see `ready()` and `wait_ready()`.
    pub fn connect_to(&self, host: &str, port: u16) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyConnected);
        }

        // Step 1: Open and configure the stream
        let stream = self.open_stream(host, port)?;
        stream.set_nodelay(self.config.nodelay)?;
        stream.set_write_timeout(self.config.write_timeout())?;
        let read_stream = stream.try_clone()?;
        self.session.writer.attach(stream);
        self.session.connected.store(true, Ordering::Release);
        tracing::info!("Connected to {}:{}", host, port);

        // Step 2: Arm the handshake before any response can arrive
        let opening = self.session.handshake.lock().start();

        // Step 3: Start the worker with the finished chain
        let chain = self.chain.lock().take().unwrap_or_default();
        let mut receiver = ReceiveLoop::new(read_stream, self.config.max_payload_size);
        let session = Arc::clone(&self.session);
        let spawned = thread::Builder::new()
            .name(Self::WORKER_NAME.to_string())
            .spawn(move || {
                let _ = session.worker_id.set(thread::current().id());
                let reason = receiver.run(&session.stopping, |frame| session.on_frame(frame, &chain));
                session.connected.store(false, Ordering::Release);
                session.writer.shutdown();
                tracing::info!("Server session ended: {:?}", reason);
                chain.dispatch(&Event::ServerDisconnected(reason));
                session.exited.arm();
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.session.connected.store(false, Ordering::Release);
                self.session.writer.shutdown();
                return Err(e.into());
            }
        };
        let _ = self.session.worker_id.set(handle.thread().id());
        *self.worker.lock() = Some(handle);

        // Step 4: Login (if configured), then version and port queries
        let sent = self.send_opening(&opening);
        if let Err(e) = sent {
            tracing::warn!("Handshake could not be sent: {}", e);
            self.disconnect_from_server();
            return Err(e);
        }
        Ok(())
    }

    /// Stop the worker, close the stream and join the worker.
    ///
    /// Idempotent. Every caller off the worker returns only after the
    /// worker's last callback; one of them joins, the others wait for the
    /// exit signal. When called from a handler (on the worker itself) the
    /// wait is skipped; the worker exits after the current callback.
    pub fn disconnect_from_server(&self) {
        self.session.stopping.store(true, Ordering::Release);
        self.session.writer.shutdown();

        let Some(worker_id) = self.session.worker_id.get() else {
            return;
        };
        if *worker_id == thread::current().id() {
            return;
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!("Receive worker panicked");
            }
            // A panicked worker never armed it.
            self.session.exited.arm();
            tracing::debug!("Receive worker joined");
        }
        self.session.exited.wait();
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::Acquire)
    }

    // =========================================================================
    // Readiness and Cached Info
    // =========================================================================

    /// The readiness signal, armed when the handshake completes
    pub fn ready(&self) -> &ReadySignal {
        &self.session.ready
    }

    pub fn is_ready(&self) -> bool {
        self.session.ready.is_armed()
    }

    /// Block until ready; `NotReady` if `timeout` elapses first
    pub fn wait_ready(&self, timeout: Duration) -> Result<()> {
        if self.session.ready.wait_timeout(timeout) {
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }

    pub fn server_info(&self) -> Result<&ServerInfo> {
        self.session.info.get().ok_or(EngineError::NotReady)
    }

    pub fn version_info(&self) -> Result<VersionInfo> {
        Ok(self.server_info()?.version)
    }

    pub fn port_info(&self) -> Result<Vec<String>> {
        Ok(self.server_info()?.ports.clone())
    }

    /// Capabilities of `port` as reported during the handshake
    pub fn port_caps(&self, port: u8) -> Result<Option<PortCaps>> {
        Ok(self.server_info()?.port_caps.get(usize::from(port)).copied())
    }

    // =========================================================================
    // Callsigns
    // =========================================================================

    /// Ask the server to register `callsign`. A no-op if already registered.
    pub fn register_callsign(&self, callsign: &str) -> Result<()> {
        if self.is_registered(callsign) {
            return Ok(());
        }
        self.send(&request::register_callsign(callsign))
    }

    /// Unregister `callsign`. The server sends no confirmation, so it is
    /// forgotten locally right away.
    pub fn unregister_callsign(&self, callsign: &str) -> Result<()> {
        self.send(&request::unregister_callsign(callsign))?;
        self.session.registered.lock().remove(callsign);
        Ok(())
    }

    pub fn is_registered(&self, callsign: &str) -> bool {
        self.session.registered.lock().contains(callsign)
    }

    pub fn registered_callsigns(&self) -> Vec<String> {
        let mut calls: Vec<String> = self.session.registered.lock().iter().cloned().collect();
        calls.sort();
        calls
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Send an unproto (UI) frame, through `via` digipeaters if given
    pub fn send_unproto(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        data: impl AsRef<[u8]>,
        via: &[&str],
    ) -> Result<()> {
        let frame = request::unproto(port, call_from, call_to, data.as_ref(), via)?;
        self.send(&frame)
    }

    /// Request a connection without registry tracking.
    ///
    /// `call_from` must be a registered callsign.
    pub fn connect(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        via: &[&str],
        pid: Option<u8>,
    ) -> Result<()> {
        if !self.is_registered(call_from) {
            return Err(EngineError::CallsignNotRegistered(call_from.to_string()));
        }
        let frame = request::connect(port, call_from, call_to, via, pid)?;
        self.send(&frame)
    }

    pub fn send_data(
        &self,
        port: u8,
        call_from: &str,
        call_to: &str,
        pid: u8,
        data: impl AsRef<[u8]>,
    ) -> Result<()> {
        self.send(&request::send_data(port, call_from, call_to, pid, data.as_ref()))
    }

    pub fn disconnect(&self, port: u8, call_from: &str, call_to: &str) -> Result<()> {
        self.send(&request::disconnect(port, call_from, call_to))
    }

    /// Transmit a raw AX.25 frame on `port`
    pub fn send_raw(&self, port: u8, call_from: &str, call_to: &str, ax25: &[u8]) -> Result<()> {
        self.send(&request::send_raw(port, call_from, call_to, ax25))
    }

    pub fn ask_version(&self) -> Result<()> {
        self.send(&request::ask_version())
    }

    pub fn ask_port_info(&self) -> Result<()> {
        self.send(&request::ask_port_info())
    }

    pub fn ask_port_caps(&self, port: u8) -> Result<()> {
        self.send(&request::ask_port_caps(port))
    }

    pub fn ask_heard(&self, port: u8) -> Result<()> {
        self.send(&request::ask_heard(port))
    }

    pub fn ask_frames_on_port(&self, port: u8) -> Result<()> {
        self.send(&request::ask_frames_on_port(port))
    }

    pub fn ask_frames_on_connection(&self, port: u8, call_from: &str, call_to: &str) -> Result<()> {
        self.send(&request::ask_frames_on_connection(port, call_from, call_to))
    }

    // =========================================================================
    // Toggles
    // =========================================================================

    /// Turn reception of monitored frames on or off.
    ///
    /// The server only offers a toggle, so a frame is sent only when the
    /// requested state differs from the current one.
    pub fn set_monitoring(&self, enabled: bool) -> Result<()> {
        let mut current = self.monitoring.lock();
        if *current != enabled {
            self.send(&request::toggle_monitoring())?;
            *current = enabled;
        }
        Ok(())
    }

    pub fn is_monitoring(&self) -> bool {
        *self.monitoring.lock()
    }

    /// Turn reception of raw frames on or off
    pub fn set_raw(&self, enabled: bool) -> Result<()> {
        let mut current = self.raw.lock();
        if *current != enabled {
            self.send(&request::toggle_raw())?;
            *current = enabled;
        }
        Ok(())
    }

    pub fn is_raw(&self) -> bool {
        *self.raw.lock()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn send(&self, frame: &Frame) -> Result<()> {
        self.session.writer.send_frame(frame)
    }

    fn send_opening(&self, opening: &[Frame]) -> Result<()> {
        if let Some(login) = &self.config.login {
            let frame = request::login(login.user.as_bytes(), login.password.as_bytes())?;
            self.send(&frame)?;
        }
        for frame in opening {
            self.send(frame)?;
        }
        Ok(())
    }

    fn open_stream(&self, host: &str, port: u16) -> Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            let attempt = match self.config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(
                    ErrorKind::AddrNotAvailable,
                    format!("no address for {}:{}", host, port),
                )
            })
            .into())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.disconnect_from_server();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("server", &self.config.server_addr())
            .field("connected", &self.is_connected())
            .field("ready", &self.is_ready())
            .finish()
    }
}
