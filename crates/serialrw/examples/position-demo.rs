//! Send position requests to a simulated device over a Unix socket.
//!
//! Run with:
//!   cargo run --example position-demo
//!
//! The example plays both sides: a device thread acknowledges every request
//! and answers with a made-up position, while the engine tracks each
//! request until its answer arrives.

use std::fs;
use std::thread;
use std::time::Duration;

use serialrw::engine::Engine;
use serialrw::packet::{Packet, PacketDecoder, PacketKind};
use serialrw::transport::{Transport, TransportRead, TransportWrite, UnixSerialSocket};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("serialrw-demo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("device.sock");

    let socket = UnixSerialSocket::bind(&sock_path)?;
    let device = thread::spawn(move || -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (mut reader, mut writer) = socket.accept()?.split()?;
        let mut decoder = PacketDecoder::new();
        let mut answered = 0u32;

        while answered < 3 {
            let Some(bytes) = reader.read(Duration::from_millis(50))? else {
                continue;
            };
            decoder.extend(&bytes);
            while let Some(request) = decoder.next_packet()? {
                let position = format!("x={},y={}", 10 * answered, 5 * answered);
                let ack = Packet::new(request.id(), PacketKind::Acknowledgement, "");
                let response = Packet::new(request.id(), PacketKind::Response, position);
                writer.write(&ack.encode()?)?;
                writer.write(&response.encode()?)?;
                writer.flush()?;
                answered += 1;
            }
        }
        Ok(())
    });

    let engine = Engine::start(UnixSerialSocket::connect(&sock_path)?)?;
    let ids = (1..=3)
        .map(|n| engine.send(PacketKind::RequestPosition, format!("robot {n}")))
        .collect::<Result<Vec<_>, _>>()?;

    for id in ids {
        let packet = engine.wait(id, Duration::from_secs(2))?;
        println!("{packet}");
    }

    engine.close();
    device
        .join()
        .map_err(|_| "device thread panicked")?
        .map_err(|err| err.to_string())?;
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
