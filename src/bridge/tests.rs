//! Unit tests for the bridge engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::codec::{Command, Response, parse_command};
use super::reader::next_backoff;
use super::session::dispatch;
use super::state::SharedState;
use crate::config::AppConfig;

#[test]
fn test_parse_setprotocol() {
    assert_eq!(parse_command("SETPROTOCOL;<=3.4"), Command::SetProtocol(Some(3.4)));
    assert_eq!(parse_command("SETPROTOCOL;<=2.0"), Command::SetProtocol(Some(2.0)));
}

#[test]
fn test_parse_setprotocol_non_numeric_version() {
    assert_eq!(parse_command("SETPROTOCOL;<=abc"), Command::SetProtocol(None));
    assert_eq!(parse_command("SETPROTOCOL;<="), Command::SetProtocol(None));
}

#[test]
fn test_parse_setprotocol_token_is_literal() {
    // Without the literal `<=` the line is not a negotiation command.
    assert_eq!(
        parse_command("SETPROTOCOL;3.4"),
        Command::Unrecognized("SETPROTOCOL;3.4".to_string())
    );
}

#[test]
fn test_parse_exact_commands() {
    assert_eq!(parse_command("GETCONFIG;GENERAL;BOXNAME"), Command::GetConfigBoxName);
    assert_eq!(parse_command("GO_LIVE"), Command::GoLive);
    assert_eq!(parse_command("GETSTATUS"), Command::GetStatus);
}

#[test]
fn test_parse_unrecognized() {
    assert_eq!(parse_command("PING"), Command::Unrecognized("PING".to_string()));
    assert_eq!(parse_command(""), Command::Unrecognized(String::new()));
}

#[test]
fn test_protocol_accepted_reply() {
    let bytes = Response::ProtocolAccepted(3.4).to_bytes();
    assert_eq!(bytes, b"SETPROTOCOL;3.4\r\n");
}

#[test]
fn test_error_replies() {
    assert_eq!(
        Response::UnsupportedProtocolVersion.to_bytes(),
        b"ERROR,Unsupported protocol version\r\n"
    );
    assert_eq!(
        Response::InvalidProtocolFormat.to_bytes(),
        b"ERROR,Invalid protocol format\r\n"
    );
}

#[test]
fn test_boxname_reply_includes_device_id() {
    let bytes = Response::BoxName("T-21753".to_string()).to_bytes();
    assert_eq!(bytes, b"GETCONFIG;GENERAL;BOXNAME;Race Result Emulator;T-21753\r\n");
}

#[test]
fn test_status_reply_shape() {
    let at = chrono::Local.with_ymd_and_hms(2026, 8, 5, 14, 30, 0).unwrap()
        + chrono::Duration::milliseconds(250);
    let text = String::from_utf8(Response::Status(at).to_bytes()).unwrap();

    assert!(text.starts_with("GETSTATUS;2026-08-05;14:30:00.250;"));
    assert!(text.ends_with("13.23\r\n"));

    // GETSTATUS + date + time + 23 fixed telemetry fields
    let fields: Vec<&str> = text.trim_end().split(';').collect();
    assert_eq!(fields.len(), 26);
    assert_eq!(fields[3], "1");
    assert_eq!(fields[4], "10000000");
}

#[test]
fn test_dispatch_accepts_equal_or_newer_version() {
    let config = AppConfig::default();
    let state = SharedState::new();

    let reply = dispatch(&Command::SetProtocol(Some(3.4)), &config, &state);
    assert_eq!(reply, Some(Response::ProtocolAccepted(3.4)));

    let reply = dispatch(&Command::SetProtocol(Some(4.0)), &config, &state);
    assert_eq!(reply, Some(Response::ProtocolAccepted(3.4)));
}

#[test]
fn test_dispatch_rejects_older_version() {
    let config = AppConfig::default();
    let state = SharedState::new();

    let reply = dispatch(&Command::SetProtocol(Some(3.0)), &config, &state);
    assert_eq!(reply, Some(Response::UnsupportedProtocolVersion));
}

#[test]
fn test_dispatch_invalid_version_format() {
    let config = AppConfig::default();
    let state = SharedState::new();

    let reply = dispatch(&Command::SetProtocol(None), &config, &state);
    assert_eq!(reply, Some(Response::InvalidProtocolFormat));
}

#[test]
fn test_dispatch_boxname_echoes_configured_device_id() {
    let mut config = AppConfig::default();
    config.protocol.device_id = "T-90001".to_string();
    let state = SharedState::new();

    let reply = dispatch(&Command::GetConfigBoxName, &config, &state);
    assert_eq!(reply, Some(Response::BoxName("T-90001".to_string())));
}

#[test]
fn test_dispatch_go_live_sets_flag_without_reply() {
    let config = AppConfig::default();
    let state = SharedState::new();
    assert!(!state.is_live());

    assert_eq!(dispatch(&Command::GoLive, &config, &state), None);
    assert!(state.is_live());

    // Idempotent on repeat.
    assert_eq!(dispatch(&Command::GoLive, &config, &state), None);
    assert!(state.is_live());
}

#[test]
fn test_dispatch_getstatus_returns_status() {
    let config = AppConfig::default();
    let state = SharedState::new();

    assert!(matches!(
        dispatch(&Command::GetStatus, &config, &state),
        Some(Response::Status(_))
    ));
}

#[test]
fn test_dispatch_unrecognized_no_reply() {
    let config = AppConfig::default();
    let state = SharedState::new();

    let reply = dispatch(&Command::Unrecognized("PING".to_string()), &config, &state);
    assert_eq!(reply, None);
}

#[test]
fn test_publish_overwrites() {
    let state = SharedState::new();
    assert_eq!(state.latest_frame(), None);

    state.publish("aa1122".to_string());
    state.publish("bb3344".to_string());
    assert_eq!(state.latest_frame(), Some("bb3344".to_string()));
}

#[test]
fn test_repeated_publish_keeps_single_slot() {
    let state = SharedState::new();
    state.publish("aa1122".to_string());
    state.publish("aa1122".to_string());
    assert_eq!(state.latest_frame(), Some("aa1122".to_string()));
}

#[test]
fn test_backoff_doubles_and_caps() {
    let max = Duration::from_secs(30);
    assert_eq!(next_backoff(Duration::from_secs(1), max), Duration::from_secs(2));
    assert_eq!(next_backoff(Duration::from_secs(8), max), Duration::from_secs(16));
    assert_eq!(next_backoff(Duration::from_secs(16), max), Duration::from_secs(30));
    assert_eq!(next_backoff(Duration::from_secs(30), max), Duration::from_secs(30));
}

#[test]
fn test_backoff_schedule_for_consecutive_failures() {
    let max = Duration::from_secs(30);
    let mut current = Duration::from_secs(1);
    let mut waits = Vec::new();
    for _ in 0..3 {
        waits.push(current);
        current = next_backoff(current, max);
    }
    assert_eq!(
        waits,
        vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[tokio::test]
async fn test_detach_clears_only_own_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let _client_a = TcpStream::connect(addr).await.unwrap();
    let (stream_a, _) = listener.accept().await.unwrap();
    let (_read_a, write_a) = stream_a.into_split();
    let first = Arc::new(tokio::sync::Mutex::new(write_a));

    let _client_b = TcpStream::connect(addr).await.unwrap();
    let (stream_b, _) = listener.accept().await.unwrap();
    let (_read_b, write_b) = stream_b.into_split();
    let second = Arc::new(tokio::sync::Mutex::new(write_b));

    let state = SharedState::new();

    state.attach_session(first.clone());
    state.attach_session(second.clone());

    // The superseded session must not clobber its replacement.
    state.detach_session(&first);
    assert!(state.has_session());

    state.detach_session(&second);
    assert!(!state.has_session());
}

#[tokio::test]
async fn test_session_command_exchange() {
    let config = Arc::new(AppConfig::default());
    let state = Arc::new(SharedState::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serve_config = config.clone();
    let serve_state = state.clone();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(tokio::sync::Mutex::new(write_half));
        serve_state.attach_session(writer.clone());
        super::session::serve(read_half, writer, serve_config, serve_state).await;
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 256];

    client.write_all(b"SETPROTOCOL;<=3.4\r\n").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"SETPROTOCOL;3.4\r\n");

    client.write_all(b"SETPROTOCOL;<=3.0\r\n").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"ERROR,Unsupported protocol version\r\n");

    client.write_all(b"GETCONFIG;GENERAL;BOXNAME\r\n").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(&buf[..n], b"GETCONFIG;GENERAL;BOXNAME;Race Result Emulator;T-21753\r\n");

    client.write_all(b"GETSTATUS\r\n").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap().unwrap();
    let status = String::from_utf8_lossy(&buf[..n]);
    assert!(status.starts_with("GETSTATUS;"));
    assert!(status.ends_with("\r\n"));

    // GO_LIVE has no reply payload; the state flag is the acknowledgement.
    assert!(!state.is_live());
    client.write_all(b"GO_LIVE\r\n").await.unwrap();
    timeout(Duration::from_secs(5), async {
        while !state.is_live() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_forwarding_gated_on_go_live() {
    // Fake tag stream the reader task will connect to.
    let source_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let source_addr = source_listener.local_addr().unwrap();

    let mut config = AppConfig::default();
    config.source.host = source_addr.ip().to_string();
    config.source.port = source_addr.port();
    config.timing.forward_interval_ms = 10;
    config.timing.status_interval_ms = 1000;
    config.timing.backoff_initial_ms = 10;
    config.timing.backoff_max_ms = 50;
    let config = Arc::new(config);
    let state = Arc::new(SharedState::new());

    let control_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control_addr = control_listener.local_addr().unwrap();

    tokio::spawn(super::reader::run(config.clone(), state.clone()));
    tokio::spawn(super::engine::forwarder(config.clone(), state.clone()));
    tokio::spawn(super::listener::accept_loop(control_listener, config.clone(), state.clone()));

    // Feed one tag frame into the bridge.
    let (mut source_peer, _) = timeout(Duration::from_secs(5), source_listener.accept())
        .await
        .unwrap()
        .unwrap();
    source_peer.write_all(b"aabbccddee112233\r\n").await.unwrap();

    let mut client = TcpStream::connect(control_addr).await.unwrap();

    // Wait until the session is attached and the payload published.
    timeout(Duration::from_secs(5), async {
        while !state.has_session() || state.latest_frame().is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // Idle bridge: several forward ticks pass, nothing may arrive.
    let mut buf = [0u8; 256];
    let idle_read = timeout(Duration::from_millis(200), client.read(&mut buf)).await;
    assert!(idle_read.is_err(), "payload forwarded before GO_LIVE");

    client.write_all(b"GO_LIVE\r\n").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap().unwrap();
    let received = String::from_utf8_lossy(&buf[..n]);
    assert!(received.contains("aabbccddee112233"));
}
