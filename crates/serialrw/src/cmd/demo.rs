use std::thread;

use bytes::BytesMut;
use serialrw_engine::Engine;
use serialrw_packet::{encode_packet, PacketKind};
use serialrw_transport::MockSerial;
use tracing::info;

use crate::cmd::{parse_duration, DemoArgs};
use crate::exit::{engine_error, packet_error, CliResult, SUCCESS};
use crate::output::{print_packets, OutputFormat};

/// Replies the scripted device sends once all requests are out: packet 0 and
/// packet 1 are acknowledged and answered, packet 2 hears nothing.
const SCRIPT: [(u8, PacketKind, &str); 4] = [
    (0, PacketKind::Acknowledgement, "hello1"),
    (0, PacketKind::Response, "hello2"),
    (1, PacketKind::Acknowledgement, "hello3"),
    (1, PacketKind::Response, "hello4"),
];

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let settle = parse_duration(&args.settle)?;
    let port = MockSerial::new();
    let engine = Engine::start(port.clone()).map_err(|err| engine_error("start failed", err))?;

    let ids = (1..=3)
        .map(|n| engine.send(PacketKind::RequestPosition, format!("hello world{n}")))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|err| engine_error("send failed", err))?;

    let mut replies = BytesMut::new();
    for (id, kind, payload) in SCRIPT {
        encode_packet(id, kind, payload.as_bytes(), &mut replies)
            .map_err(|err| packet_error("script encoding failed", err))?;
    }
    info!(len = replies.len(), "injecting scripted replies");
    port.inject(&replies);

    thread::sleep(settle);

    let packets = ids
        .into_iter()
        .map(|id| engine.query(id))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| engine_error("query failed", err))?;
    engine.close();

    print_packets(&packets, format);
    Ok(SUCCESS)
}
