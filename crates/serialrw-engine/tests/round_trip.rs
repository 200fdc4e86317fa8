#![cfg(unix)]

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serialrw_engine::{Engine, EngineConfig, EngineError};
use serialrw_packet::{encode_packet, PacketDecoder, PacketKind, PacketState, TimeoutPolicy};
use serialrw_transport::{MockSerial, StreamTransport};

fn frame(id: u8, kind: PacketKind, payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_packet(id, kind, payload, &mut buf).expect("frame should encode");
    buf.to_vec()
}

fn wait_for_state(engine: &Engine, id: u8, state: PacketState) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let packet = engine.query(id).expect("packet should exist");
        if packet.state() == state {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "packet {id} stuck in {}",
            packet.state()
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn three_requests_with_scripted_replies() {
    let port = MockSerial::new();
    let engine = Engine::start(port.clone()).expect("engine should start");

    let ids: Vec<u8> = (1..=3)
        .map(|n| {
            engine
                .send(PacketKind::RequestPosition, format!("hello world{n}"))
                .expect("send should succeed")
        })
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    port.inject_frames([
        frame(1, PacketKind::Acknowledgement, b"hello3"),
        frame(0, PacketKind::Response, b"hello2"),
    ]);

    wait_for_state(&engine, 1, PacketState::AwaitingResponse);
    wait_for_state(&engine, 0, PacketState::ResponseReceived);

    let answered = engine.query(0).expect("packet 0 should exist");
    assert!(!answered.is_acknowledged());
    assert_eq!(
        answered.response().map(|r| r.payload().to_vec()),
        Some(b"hello2".to_vec())
    );

    let acked = engine.query(1).expect("packet 1 should exist");
    assert!(acked.is_acknowledged());
    assert!(acked.response().is_none());

    let untouched = engine.query(2).expect("packet 2 should exist");
    assert_eq!(untouched.state(), PacketState::AwaitingAcknowledgement);
    assert_eq!(untouched.payload().as_ref(), b"hello world3");

    assert_eq!(engine.outstanding(), vec![0, 1, 2]);
    engine.close();
}

#[test]
fn orphaned_and_unexpected_frames_are_tolerated() {
    let port = MockSerial::new();
    let engine = Engine::start(port.clone()).expect("engine should start");
    let id = engine
        .send(PacketKind::RequestPosition, "pos")
        .expect("send should succeed");

    port.inject(&frame(200, PacketKind::Response, b"nobody asked"));
    port.inject(&frame(id, PacketKind::RequestPosition, b"echo"));
    thread::sleep(Duration::from_millis(30));
    port.inject(&frame(id, PacketKind::Acknowledgement, b""));
    port.inject(&frame(id, PacketKind::Acknowledgement, b""));

    wait_for_state(&engine, id, PacketState::AwaitingResponse);
    assert!(matches!(
        engine.query(200),
        Err(EngineError::InvalidPacketId(200))
    ));

    port.inject(&frame(id, PacketKind::Response, b"1,2"));
    wait_for_state(&engine, id, PacketState::ResponseReceived);
    engine.close();
}

#[test]
fn unanswered_request_times_out() {
    let config = EngineConfig {
        timeouts: TimeoutPolicy {
            response_timeout: Duration::from_millis(50),
            override_grace: Duration::from_millis(20),
        },
        sweep_interval: Duration::from_millis(5),
        ..EngineConfig::default()
    };
    let port = MockSerial::new();
    let engine = Engine::with_config(port.clone(), config).expect("engine should start");

    let id = engine
        .send(PacketKind::RequestPosition, "lost")
        .expect("send should succeed");
    wait_for_state(&engine, id, PacketState::TimedOut);

    // A late response does not revive the packet.
    port.inject(&frame(id, PacketKind::Response, b"too late"));
    thread::sleep(Duration::from_millis(30));
    let packet = engine.query(id).expect("packet should exist");
    assert_eq!(packet.state(), PacketState::TimedOut);
    assert!(packet.response().is_none());
    engine.close();
}

#[test]
fn send_is_flushed_before_returning() {
    let port = MockSerial::new();
    let engine = Engine::start(port.clone()).expect("engine should start");
    engine
        .send(PacketKind::RequestPosition, "one")
        .expect("send should succeed");
    drop(engine);

    assert_eq!(
        port.written().as_ref(),
        frame(0, PacketKind::RequestPosition, b"one").as_slice()
    );
}

#[test]
fn round_trip_over_unix_stream() {
    let (local, mut remote) = UnixStream::pair().expect("socket pair should open");
    let engine = Engine::start(StreamTransport::new(local)).expect("engine should start");

    let device = thread::spawn(move || {
        let mut decoder = PacketDecoder::new();
        let mut chunk = [0u8; 256];
        let request = loop {
            if let Some(packet) = decoder.next_packet().expect("request should decode") {
                break packet;
            }
            let n = remote.read(&mut chunk).expect("device read should succeed");
            assert!(n > 0, "engine closed the link early");
            decoder.extend(&chunk[..n]);
        };
        assert_eq!(request.kind(), PacketKind::RequestPosition);

        let mut reply = frame(request.id(), PacketKind::Acknowledgement, b"");
        reply.extend(frame(request.id(), PacketKind::Response, request.payload()));
        remote.write_all(&reply).expect("device write should succeed");
        remote
    });

    let id = engine
        .send(PacketKind::RequestPosition, "where are you")
        .expect("send should succeed");
    let packet = engine
        .wait(id, Duration::from_secs(2))
        .expect("packet should exist");

    assert_eq!(packet.state(), PacketState::ResponseReceived);
    assert!(packet.is_acknowledged());
    assert!(packet.round_trip().is_some());
    assert_eq!(
        packet.response().map(|r| r.payload_as_str().into_owned()),
        Some("where are you".to_string())
    );

    let _remote = device.join().expect("device thread should finish");
    engine.close();
}
