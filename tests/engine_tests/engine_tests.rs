//! Tests for Engine
//!
//! These tests verify:
//! - Handshake, cached info and readiness gating
//! - Event delivery order on the worker
//! - Session end: server close, framing errors, local and concurrent disconnect
//! - Request serialization across threads
//! - Callsign registration and the monitoring toggle

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{caps_frame, data_frame, of_kind, wait_for, ChannelHandler, FakeServer, WAIT};
use packet_engine::error::EngineError;
use packet_engine::handler::{HandlerChain, HandlerResult, ReceiveHandler};
use packet_engine::protocol::{encode, Frame, FrameKind};
use packet_engine::Engine;

// =============================================================================
// Helper Functions
// =============================================================================

fn engine_with_recorder(server: &FakeServer) -> (Engine, crossbeam::channel::Receiver<String>) {
    let engine = Engine::new(server.config()).unwrap();
    let (handler, rx) = ChannelHandler::new();
    engine.set_handlers(HandlerChain::new().add(handler)).unwrap();
    (engine, rx)
}

/// Blocks the worker inside a data callback
struct SlowData {
    started: crossbeam::channel::Sender<()>,
    finished: Arc<AtomicBool>,
}

impl ReceiveHandler for SlowData {
    fn connected_data(&self, _port: u8, _from: &str, _to: &str, _pid: u8, _data: &[u8]) -> HandlerResult {
        let _ = self.started.send(());
        thread::sleep(Duration::from_millis(600));
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Handshake and Readiness Tests
// =============================================================================

#[test]
fn test_handshake_populates_info() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&["Port1 vhf", "Port2 hf"]);
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    assert!(matches!(engine.version_info(), Err(EngineError::NotReady)));

    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    let version = engine.version_info().unwrap();
    assert_eq!((version.major, version.minor), (2000, 78));
    assert_eq!(engine.port_info().unwrap(), vec!["Port1 vhf", "Port2 hf"]);
    assert_eq!(engine.port_caps(1).unwrap().unwrap().active_connections, 1);
    assert!(engine.port_caps(5).unwrap().is_none());

    let seen = wait_for(&rx, "caps 1");
    assert_eq!(seen, vec!["version 2000.78", "ports 2", "caps 0"]);

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_handlers_see_handshake_before_ready() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&["Port1"]);
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    let (handler, rx) = ChannelHandler::new();
    let ready_tx = handler.sender();
    engine.set_handlers(HandlerChain::new().add(handler)).unwrap();

    // Registered before arming; runs on the worker after the last dispatch
    engine.ready().listen(move || {
        let _ = ready_tx.send("ready".to_string());
    });

    engine.connect_to_server().unwrap();
    let seen = wait_for(&rx, "ready");
    assert_eq!(seen, vec!["version 2000.78", "ports 1", "caps 0"]);

    // Listeners added after arming run at once
    let (tx, late) = crossbeam::channel::bounded(1);
    engine.ready().listen(move || tx.send(()).unwrap());
    assert!(late.try_recv().is_ok());
    assert!(engine.ready().subscribe().try_recv().is_ok());

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_no_ports_ready_after_port_info() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    engine.connect_to_server().unwrap();

    engine.wait_ready(WAIT).unwrap();
    assert!(engine.port_info().unwrap().is_empty());
    assert!(server.received(FrameKind::PortCaps).is_empty());

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_not_ready_until_handshake_answered() {
    let server = FakeServer::start(|conn| {
        conn.expect(FrameKind::Version);
        conn.expect(FrameKind::PortInfo);
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    engine.connect_to_server().unwrap();

    assert!(matches!(
        engine.wait_ready(Duration::from_millis(200)),
        Err(EngineError::NotReady)
    ));
    assert!(matches!(engine.port_info(), Err(EngineError::NotReady)));
    assert!(!engine.is_ready());

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_login_precedes_handshake() {
    let server = FakeServer::start(|conn| {
        let login = conn.expect(FrameKind::Login);
        assert_eq!(&login.payload[..5], b"alice");
        assert_eq!(&login.payload[255..261], b"s3cret");
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let mut config = server.config();
    config.login = Some(packet_engine::config::Credentials {
        user: "alice".to_string(),
        password: "s3cret".to_string(),
    });
    let engine = Engine::new(config).unwrap();
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    engine.disconnect_from_server();
    server.join();
}

// =============================================================================
// Delivery Order Tests
// =============================================================================

#[test]
fn test_events_in_arrival_order() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        for i in 0..50 {
            conn.send(data_frame(0, "N0CALL", "KD6YAM", &format!("msg{}", i)));
        }
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();

    let seen = wait_for(&rx, "server closed");
    let data: Vec<String> = seen.into_iter().filter(|e| e.starts_with("data")).collect();
    let expected: Vec<String> = (0..50).map(|i| format!("data msg{}", i)).collect();
    assert_eq!(data, expected);

    server.join();
}

#[test]
fn test_protocol_violation_dropped() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        // Seven byte version record, then a valid frame
        conn.send(Frame::new(FrameKind::Version, 0).with_payload(vec![0u8; 7]));
        // A kind servers never send
        conn.send(Frame::new(FrameKind::Unproto, 0).with_payload(&b"bogus"[..]));
        conn.send(data_frame(0, "N0CALL", "KD6YAM", "still here"));
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();

    let seen = wait_for(&rx, "server closed");
    assert_eq!(seen, vec!["version 2000.78", "ports 0", "data still here"]);

    server.join();
}

// =============================================================================
// Session End Tests
// =============================================================================

#[test]
fn test_server_close_reported() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();

    wait_for(&rx, "server closed");
    server.join();

    // The worker marks the session down before its final dispatch
    assert!(!engine.is_connected());
    assert!(matches!(
        engine.ask_version(),
        Err(EngineError::NotConnected) | Err(EngineError::Io(_))
    ));
}

#[test]
fn test_framing_error_ends_session() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        let mut header = encode(FrameKind::Data, 0, "N0CALL", "KD6YAM", 0xF0, b"").unwrap().to_vec();
        header[28..32].copy_from_slice(&u32::MAX.to_le_bytes());
        conn.send_raw(&header);
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();

    wait_for(&rx, "server framing");
    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_disconnect_joins_worker() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    engine.disconnect_from_server();

    // The final event was delivered before disconnect returned
    let mut events: Vec<String> = rx.try_iter().collect();
    assert_eq!(events.pop().as_deref(), Some("server requested"));
    assert!(!engine.is_connected());

    // Idempotent, and nothing more is delivered
    engine.disconnect_from_server();
    assert!(rx.try_recv().is_err());

    server.join();
}

#[test]
fn test_every_disconnect_caller_waits_for_worker() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.send(data_frame(0, "N0CALL", "KD6YAM", "slow"));
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    let (started_tx, started_rx) = crossbeam::channel::bounded(1);
    let finished = Arc::new(AtomicBool::new(false));
    let slow = Arc::new(SlowData {
        started: started_tx,
        finished: Arc::clone(&finished),
    });
    engine.set_handlers(HandlerChain::new().add(slow)).unwrap();
    engine.connect_to_server().unwrap();
    started_rx.recv_timeout(WAIT).unwrap();

    thread::scope(|scope| {
        let first = scope.spawn(|| engine.disconnect_from_server());
        thread::sleep(Duration::from_millis(50));

        // Loses the race for the join handle but must still wait
        engine.disconnect_from_server();
        assert!(finished.load(Ordering::SeqCst));
        first.join().unwrap();
    });

    assert!(!engine.is_connected());
    server.join();
}

#[test]
fn test_panicking_ready_listener_keeps_worker_alive() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.send(data_frame(0, "N0CALL", "KD6YAM", "after ready"));
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.ready().listen(|| panic!("listener bug"));
    engine.connect_to_server().unwrap();

    let seen = wait_for(&rx, "server closed");
    assert_eq!(seen, vec!["version 2000.78", "ports 0", "data after ready"]);
    assert!(engine.is_ready());
    assert!(!engine.is_connected());

    server.join();
}

#[test]
fn test_handlers_fixed_once_connected() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    engine.connect_to_server().unwrap();

    assert!(matches!(
        engine.set_handlers(HandlerChain::new()),
        Err(EngineError::AlreadyConnected)
    ));
    assert!(matches!(engine.connect_to_server(), Err(EngineError::AlreadyConnected)));

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_requests_fail_before_connect() {
    let engine = Engine::new(packet_engine::Config::default()).unwrap();
    assert!(matches!(engine.ask_version(), Err(EngineError::NotConnected)));
    assert!(!engine.is_connected());
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_unproto_via_on_wire() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&["Port1"]);
        let frame = conn.expect(FrameKind::UnprotoVia);
        assert_eq!((frame.port, frame.pid), (0, 0xF0));
        assert_eq!((frame.call_from.as_str(), frame.call_to.as_str()), ("KD6YAM", "IDENT"));
        assert_eq!(frame.payload[0], 1);
        assert_eq!(&frame.payload[1..8], b"WIDE1-1");
        assert_eq!(&frame.payload[11..], b"This is a test");
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    engine
        .send_unproto(0, "KD6YAM", "IDENT", "This is a test", &["WIDE1-1"])
        .unwrap();

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_concurrent_senders_do_not_interleave() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 50;

    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let engine = Arc::new(Engine::new(server.config()).unwrap());
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    let senders: Vec<_> = (0..THREADS)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let text = format!("thread {} message {} {}", t, i, "x".repeat(i * 7));
                    engine.send_unproto(0, "KD6YAM", "ID", text, &[]).unwrap();
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }

    engine.disconnect_from_server();
    let sent = of_kind(&server.join(), FrameKind::Unproto);
    assert_eq!(sent.len(), THREADS * PER_THREAD);
    for frame in &sent {
        let text = String::from_utf8(frame.payload.to_vec()).unwrap();
        assert!(text.starts_with("thread "), "corrupt frame {:?}", text);
    }
}

#[test]
fn test_connect_requires_registration() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&["Port1"]);
        let register = conn.expect(FrameKind::RegisterCallsign);
        conn.send(
            Frame::new(FrameKind::RegisterCallsign, 0)
                .with_calls(register.call_from, "")
                .with_payload(vec![1u8]),
        );
        let connect = conn.expect(FrameKind::Connect);
        assert_eq!(connect.call_to, "N0CALL");
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    assert!(matches!(
        engine.connect(0, "KD6YAM", "N0CALL", &[], None),
        Err(EngineError::CallsignNotRegistered(_))
    ));

    engine.register_callsign("KD6YAM").unwrap();
    wait_for(&rx, "registered KD6YAM true");
    assert!(engine.is_registered("KD6YAM"));

    // Already registered: no second request
    engine.register_callsign("KD6YAM").unwrap();
    engine.connect(0, "KD6YAM", "N0CALL", &[], None).unwrap();

    engine.disconnect_from_server();
    assert_eq!(of_kind(&server.join(), FrameKind::RegisterCallsign).len(), 1);
}

#[test]
fn test_unregister_is_local_immediately() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.expect(FrameKind::RegisterCallsign);
        conn.send(
            Frame::new(FrameKind::RegisterCallsign, 0)
                .with_calls("KD6YAM", "")
                .with_payload(vec![1u8]),
        );
        conn.expect(FrameKind::UnregisterCallsign);
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    engine.register_callsign("KD6YAM").unwrap();
    wait_for(&rx, "registered KD6YAM true");
    engine.unregister_callsign("KD6YAM").unwrap();
    assert!(!engine.is_registered("KD6YAM"));
    assert!(engine.registered_callsigns().is_empty());

    engine.disconnect_from_server();
    server.join();
}

#[test]
fn test_monitoring_toggle_sent_on_change_only() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&[]);
        conn.drain();
    });
    let engine = Engine::new(server.config()).unwrap();
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();

    engine.set_monitoring(true).unwrap();
    engine.set_monitoring(true).unwrap();
    assert!(engine.is_monitoring());
    engine.set_monitoring(false).unwrap();
    engine.set_raw(false).unwrap();
    engine.set_raw(true).unwrap();
    assert!(engine.is_raw());
    engine.disconnect_from_server();

    let frames = server.join();
    assert_eq!(of_kind(&frames, FrameKind::ToggleMonitoring).len(), 2);
    assert_eq!(of_kind(&frames, FrameKind::ToggleRaw).len(), 1);
}

#[test]
fn test_handshake_caps_for_each_port() {
    let server = FakeServer::start(|conn| {
        conn.serve_handshake(&["A", "B", "C"]);
        // A stray caps answer after readiness changes nothing
        conn.send(caps_frame(7));
        conn.drain();
    });
    let (engine, rx) = engine_with_recorder(&server);
    engine.connect_to_server().unwrap();
    engine.wait_ready(WAIT).unwrap();
    wait_for(&rx, "caps 7");

    assert_eq!(engine.server_info().unwrap().port_caps.len(), 3);
    engine.disconnect_from_server();
    assert_eq!(of_kind(&server.join(), FrameKind::PortCaps).len(), 3);
}
