use std::io::{IsTerminal, Write};
use std::time::Instant;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialrw_packet::Packet;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput {
    id: u8,
    kind: &'static str,
    state: &'static str,
    payload_size: usize,
    payload: String,
    acknowledged_after_ms: Option<u64>,
    response_after_ms: Option<u64>,
    response: Option<ResponseOutput>,
}

#[derive(Serialize)]
struct ResponseOutput {
    id: u8,
    kind: &'static str,
    payload_size: usize,
    payload: String,
}

impl PacketOutput {
    fn from_packet(packet: &Packet) -> Self {
        Self {
            id: packet.id(),
            kind: packet.kind().name(),
            state: packet.state().name(),
            payload_size: packet.payload().len(),
            payload: payload_preview(packet.payload()),
            acknowledged_after_ms: since_sent(packet, packet.time_ack_received()),
            response_after_ms: since_sent(packet, packet.time_response_received()),
            response: packet.response().map(|response| ResponseOutput {
                id: response.id(),
                kind: response.kind().name(),
                payload_size: response.payload().len(),
                payload: payload_preview(response.payload()),
            }),
        }
    }
}

pub fn print_packets(packets: &[Packet], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for packet in packets {
                let out = PacketOutput::from_packet(packet);
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "KIND", "STATE", "PAYLOAD", "ACK", "RESPONSE"]);
            for packet in packets {
                let out = PacketOutput::from_packet(packet);
                table.add_row(vec![
                    out.id.to_string(),
                    out.kind.to_string(),
                    out.state.to_string(),
                    out.payload,
                    format_ms(out.acknowledged_after_ms),
                    out.response
                        .map(|r| r.payload)
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for packet in packets {
                println!("{packet}");
            }
        }
        OutputFormat::Raw => {
            for packet in packets {
                if let Some(response) = packet.response() {
                    print_raw(response.payload());
                }
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn since_sent(packet: &Packet, at: Option<Instant>) -> Option<u64> {
    let sent = packet.time_sent()?;
    let at = at?;
    Some(at.saturating_duration_since(sent).as_millis() as u64)
}

fn format_ms(ms: Option<u64>) -> String {
    ms.map_or_else(|| "-".to_string(), |ms| format!("{ms}ms"))
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serialrw_packet::PacketKind;

    use super::*;

    #[test]
    fn json_snapshot_reports_timings_and_response() {
        let t0 = Instant::now();
        let mut packet = Packet::new(2, PacketKind::RequestPosition, "where");
        packet.mark_sent_at(t0).expect("first send");
        packet
            .receive_acknowledgement_at(t0 + Duration::from_millis(3))
            .expect("first ack");
        packet
            .receive_response_at(
                Packet::new(2, PacketKind::Response, "12,7"),
                t0 + Duration::from_millis(9),
            )
            .expect("first response");

        let json = serde_json::to_value(PacketOutput::from_packet(&packet))
            .expect("output should serialize");
        assert_eq!(json["id"], 2);
        assert_eq!(json["kind"], "REQUEST_POSITION");
        assert_eq!(json["state"], "RESPONSE_RECEIVED");
        assert_eq!(json["acknowledged_after_ms"], 3);
        assert_eq!(json["response_after_ms"], 9);
        assert_eq!(json["response"]["payload"], "12,7");
    }

    #[test]
    fn pending_packet_has_no_timings() {
        let mut packet = Packet::new(0, PacketKind::RequestPosition, vec![0xFF, 0xFE]);
        packet.mark_sent().expect("first send");

        let json = serde_json::to_value(PacketOutput::from_packet(&packet))
            .expect("output should serialize");
        assert_eq!(json["state"], "AWAITING_ACKNOWLEDGEMENT");
        assert!(json["acknowledged_after_ms"].is_null());
        assert!(json["response"].is_null());
        assert_eq!(json["payload"], "<binary 2 bytes>");
    }
}
