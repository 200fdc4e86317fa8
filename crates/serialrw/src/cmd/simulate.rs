use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use serialrw_packet::{encode_packet, Packet, PacketDecoder, PacketError, PacketKind};
use serialrw_transport::{TransportError, TransportWrite};
use tracing::{info, warn};

use crate::cmd::{parse_duration, SimulateArgs};
use crate::exit::{packet_error, transport_error, CliError, CliResult, SUCCESS};

const POLL: Duration = Duration::from_millis(25);

/// How the simulated device answers each request.
#[derive(Debug, Clone, Copy)]
struct Behavior {
    respond: bool,
    delay: Option<Duration>,
}

#[cfg(unix)]
pub fn run(args: SimulateArgs) -> CliResult<i32> {
    use serialrw_transport::{Transport, TransportRead, UnixSerialSocket};

    let behavior = Behavior {
        respond: !args.ack_only,
        delay: args.delay.as_deref().map(parse_duration).transpose()?,
    };
    let socket =
        UnixSerialSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut handled = 0usize;

    while running.load(Ordering::SeqCst) {
        let link = match socket.try_accept() {
            Ok(Some(link)) => link,
            Ok(None) => {
                thread::sleep(POLL);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        let (mut reader, mut writer) = link
            .split()
            .map_err(|err| transport_error("link setup failed", err))?;
        let mut decoder = PacketDecoder::new();
        info!("host connected");

        while running.load(Ordering::SeqCst) {
            match reader.read(POLL) {
                Ok(Some(bytes)) => decoder.extend(&bytes),
                Ok(None) => continue,
                Err(TransportError::Closed) => {
                    info!("host disconnected");
                    break;
                }
                Err(err) => return Err(transport_error("receive failed", err)),
            }

            for request in drain_requests(&mut decoder) {
                answer(&mut writer, &request, behavior)?;
                handled = handled.saturating_add(1);

                if args.count.is_some_and(|count| handled >= count) {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

#[cfg(not(unix))]
pub fn run(args: SimulateArgs) -> CliResult<i32> {
    Err(CliError::new(
        crate::exit::USAGE,
        format!(
            "{}: socket links require Unix domain sockets",
            args.path.display()
        ),
    ))
}

/// Pull every complete request out of the decoder, skipping anything a
/// device would not act on.
fn drain_requests(decoder: &mut PacketDecoder) -> Vec<Packet> {
    let mut requests = Vec::new();
    loop {
        match decoder.next_packet() {
            Ok(Some(packet)) if packet.kind().is_request() => requests.push(packet),
            Ok(Some(packet)) => {
                warn!(id = packet.id(), kind = %packet.kind(), "ignoring non-request packet");
            }
            Ok(None) => return requests,
            Err(err @ PacketError::UnsupportedKind { .. }) => {
                warn!(%err, "ignoring unsupported packet");
            }
            Err(err) => {
                warn!(%err, "discarding undecodable input");
                return requests;
            }
        }
    }
}

/// Acknowledge `request`, then echo its payload back as the response.
fn answer<W: TransportWrite>(
    writer: &mut W,
    request: &Packet,
    behavior: Behavior,
) -> CliResult<()> {
    let id = request.id();

    let mut frame = BytesMut::new();
    encode_packet(id, PacketKind::Acknowledgement, &[], &mut frame)
        .map_err(|err| packet_error("encode failed", err))?;
    send_frame(writer, &frame)?;
    info!(id, kind = %request.kind(), "acknowledged request");

    if !behavior.respond {
        return Ok(());
    }
    if let Some(delay) = behavior.delay {
        thread::sleep(delay);
    }

    frame.clear();
    encode_packet(id, PacketKind::Response, request.payload(), &mut frame)
        .map_err(|err| packet_error("encode failed", err))?;
    send_frame(writer, &frame)?;
    info!(id, len = request.payload().len(), "answered request");
    Ok(())
}

fn send_frame<W: TransportWrite>(writer: &mut W, frame: &[u8]) -> CliResult<()> {
    writer
        .write(frame)
        .and_then(|()| writer.flush())
        .map_err(|err| transport_error("send failed", err))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
