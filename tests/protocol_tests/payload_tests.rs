//! Tests for response payload decoding
//!
//! These tests verify:
//! - Fixed-size responses and their length checks
//! - Port info text handling
//! - Heard records with and without timestamps
//! - Monitor header/data splitting
//! - Frame to event translation

use bytes::Bytes;
use packet_engine::error::EngineError;
use packet_engine::event::{Event, INCOMING_CONNECT_PREFIX};
use packet_engine::protocol::payload::{
    encode_via_list, parse_count, parse_heard, parse_port_caps, parse_port_info, parse_version,
    split_monitor_data,
};
use packet_engine::protocol::{Frame, FrameKind};

// =============================================================================
// Helper Functions
// =============================================================================

fn systemtime(year: u16, month: u16, day: u16, hour: u16, minute: u16, second: u16) -> Vec<u8> {
    [year, month, 0, day, hour, minute, second, 0]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}

// =============================================================================
// Fixed Size Responses
// =============================================================================

#[test]
fn test_parse_version() {
    let info = parse_version(&[0xD0, 0x07, 0, 0, 78, 0, 0, 0]).unwrap();
    assert_eq!(info.major, 2000);
    assert_eq!(info.minor, 78);
    assert_eq!(info.to_string(), "2000.78");

    assert!(matches!(parse_version(&[1, 0, 0]), Err(EngineError::ProtocolViolation(_))));
}

#[test]
fn test_parse_port_caps() {
    let payload = [1, 2, 30, 10, 63, 10, 7, 3, 0x10, 0x27, 0, 0];
    let caps = parse_port_caps(&payload).unwrap();
    assert_eq!(caps.tx_delay, 30);
    assert_eq!(caps.persist, 63);
    assert_eq!(caps.max_frame, 7);
    assert_eq!(caps.active_connections, 3);
    assert_eq!(caps.bytes_received, 10_000);

    assert!(parse_port_caps(&payload[..11]).is_err());
}

#[test]
fn test_parse_count() {
    assert_eq!(parse_count(&5u32.to_le_bytes()).unwrap(), 5);
    assert!(parse_count(&[0, 0]).is_err());
}

// =============================================================================
// Port Info
// =============================================================================

#[test]
fn test_parse_port_info() {
    let ports = parse_port_info(b"2;Port1 with SoundCard;Port2 TNC on COM3;");
    assert_eq!(ports, vec!["Port1 with SoundCard", "Port2 TNC on COM3"]);
}

#[test]
fn test_parse_port_info_ignores_after_nul() {
    let ports = parse_port_info(b"1;Port1 vhf;\0;Port9 garbage;");
    assert_eq!(ports, vec!["Port1 vhf"]);

    assert!(parse_port_info(b"0;").is_empty());
    assert!(parse_port_info(b"").is_empty());
}

// =============================================================================
// Heard Records
// =============================================================================

#[test]
fn test_heard_text_only() {
    let heard = parse_heard(b"KD6YAM-9 Fri Jan 05 10:15:00 Fri Jan 05 11:20:00\0").unwrap();
    assert_eq!(heard.callsign, "KD6YAM-9");
    assert_eq!(heard.first_heard, "Fri Jan 05 10:15:00");
    assert_eq!(heard.last_heard, "Fri Jan 05 11:20:00");
    assert!(heard.first_heard_ts.is_none());
}

#[test]
fn test_heard_with_timestamps() {
    let mut payload = b"N0CALL 10:15 11:20\0".to_vec();
    payload.extend(systemtime(2024, 3, 9, 10, 15, 0));
    payload.extend(systemtime(2024, 3, 9, 11, 20, 30));

    let heard = parse_heard(&payload).unwrap();
    let first = heard.first_heard_ts.unwrap();
    let last = heard.last_heard_ts.unwrap();
    assert_eq!((first.year, first.month, first.day, first.hour), (2024, 3, 9, 10));
    assert_eq!((last.minute, last.second), (20, 30));
}

#[test]
fn test_heard_timestamps_after_padding() {
    let mut payload = b"N0CALL 10:15 11:20\0\0\0\0".to_vec();
    payload.extend(systemtime(2023, 12, 31, 23, 59, 59));
    payload.extend(systemtime(2024, 1, 1, 0, 0, 1));

    let heard = parse_heard(&payload).unwrap();
    assert_eq!(heard.first_heard_ts.unwrap().year, 2023);
    assert_eq!(heard.last_heard_ts.unwrap().year, 2024);
}

#[test]
fn test_heard_zero_timestamps_dropped() {
    let mut payload = b"N0CALL 10:15 11:20\0".to_vec();
    payload.extend(vec![0u8; 32]);
    let heard = parse_heard(&payload).unwrap();
    assert!(heard.first_heard_ts.is_none());
    assert!(heard.last_heard_ts.is_none());
}

#[test]
fn test_heard_empty_or_malformed() {
    assert!(parse_heard(b"\0").is_none());
    assert!(parse_heard(b"").is_none());
    // Even word count cannot split into callsign plus two equal timestamps
    assert!(parse_heard(b"N0CALL 10:15 11:20 extra\0").is_none());
    assert!(parse_heard(b"N0CALL-99 10:15 11:20\0").is_none());
}

// =============================================================================
// Monitor Data
// =============================================================================

#[test]
fn test_monitor_split_with_len() {
    let payload = Bytes::from_static(b" 1:Fm KD6YAM To ID <UI pid=F0 Len=5 >[10:00:00]\rhello\r\0");
    let record = split_monitor_data(&payload);
    assert_eq!(
        record.text.as_deref(),
        Some(" 1:Fm KD6YAM To ID <UI pid=F0 Len=5 >[10:00:00]")
    );
    assert_eq!(&record.data[..], b"hello");
}

#[test]
fn test_monitor_split_without_len() {
    let payload = Bytes::from_static(b" 1:Fm KD6YAM To N0CALL <RR R1 >[10:00:00]\rtrailing");
    let record = split_monitor_data(&payload);
    assert!(record.text.is_some());
    assert_eq!(&record.data[..], b"trailing");
}

#[test]
fn test_monitor_split_without_cr() {
    let payload = Bytes::from_static(b"no header line");
    let record = split_monitor_data(&payload);
    assert!(record.text.is_none());
    assert_eq!(&record.data[..], b"no header line");
}

#[test]
fn test_via_list_encoding() {
    let via = encode_via_list(&["WIDE1-1", "WIDE2-2"]).unwrap();
    assert_eq!(via.len(), 21);
    assert_eq!(via[0], 2);
    assert_eq!(&via[11..18], b"WIDE2-2");

    assert_eq!(&encode_via_list(&[]).unwrap()[..], &[0]);
}

// =============================================================================
// Frame to Event
// =============================================================================

#[test]
fn test_connect_message_direction() {
    let message = format!("{}KD6YAM", INCOMING_CONNECT_PREFIX);
    let incoming = Frame::new(FrameKind::Connect, 0)
        .with_calls("N0CALL", "KD6YAM")
        .with_payload(message.into_bytes());
    match Event::from_frame(&incoming).unwrap() {
        Event::ConnectionReceived { incoming, call_from, .. } => {
            assert!(incoming);
            assert_eq!(call_from, "N0CALL");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let confirmed = Frame::new(FrameKind::Connect, 0)
        .with_calls("KD6YAM", "N0CALL")
        .with_payload(&b"*** CONNECTED With N0CALL\0"[..]);
    match Event::from_frame(&confirmed).unwrap() {
        Event::ConnectionReceived { incoming, message, .. } => {
            assert!(!incoming);
            assert_eq!(message, "*** CONNECTED With N0CALL");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_fixed_length_mismatch_is_violation() {
    let short_version = Frame::new(FrameKind::Version, 0).with_payload(vec![0u8; 7]);
    assert!(matches!(
        Event::from_frame(&short_version),
        Err(EngineError::ProtocolViolation(_))
    ));

    let long_register = Frame::new(FrameKind::RegisterCallsign, 0).with_payload(vec![1u8, 0]);
    assert!(Event::from_frame(&long_register).is_err());
}

#[test]
fn test_client_only_kinds_rejected() {
    for kind in [FrameKind::Unproto, FrameKind::ConnectVia, FrameKind::Login, FrameKind::Unknown(b'Z')] {
        let frame = Frame::new(kind, 0);
        assert!(
            matches!(Event::from_frame(&frame), Err(EngineError::ProtocolViolation(_))),
            "kind {}",
            kind
        );
    }
}

#[test]
fn test_register_response_event() {
    let frame = Frame::new(FrameKind::RegisterCallsign, 0)
        .with_calls("KD6YAM", "")
        .with_payload(vec![1u8]);
    assert_eq!(
        Event::from_frame(&frame).unwrap(),
        Event::CallsignRegistered {
            callsign: "KD6YAM".to_string(),
            success: true
        }
    );
}

#[test]
fn test_monitor_event_split() {
    let frame = Frame::new(FrameKind::MonitoredUnproto, 1)
        .with_calls("KD6YAM", "BEACON")
        .with_payload(&b" 2:Fm KD6YAM To BEACON <UI pid=F0 Len=3 >\rabcdef"[..]);
    match Event::from_frame(&frame).unwrap() {
        Event::MonitoredUnproto { port, text, data, .. } => {
            assert_eq!(port, 1);
            assert!(text.unwrap().contains("Len=3"));
            assert_eq!(&data[..], b"abc");
        }
        other => panic!("unexpected event {:?}", other),
    }
}
