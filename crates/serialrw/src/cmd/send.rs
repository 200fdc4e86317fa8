use std::fs;
use std::path::Path;

use serialrw_engine::{Engine, EngineConfig};
use serialrw_packet::{PacketState, TimeoutPolicy};
use serialrw_transport::Transport;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{engine_error, io_error, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_packets, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let response_timeout = parse_duration(&args.response_timeout)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let link = open_link(&args.path)?;
    let config = EngineConfig {
        timeouts: TimeoutPolicy {
            response_timeout,
            ..TimeoutPolicy::default()
        },
        ..EngineConfig::default()
    };
    let engine =
        Engine::with_config(link, config).map_err(|err| engine_error("start failed", err))?;

    let id = engine
        .send(args.kind, payload)
        .map_err(|err| engine_error("send failed", err))?;
    let packet = engine
        .wait(id, wait_timeout)
        .map_err(|err| engine_error("query failed", err))?;
    engine.close();

    print_packets(std::slice::from_ref(&packet), format);
    Ok(exit_code(packet.state()))
}

#[cfg(unix)]
fn open_link(path: &Path) -> CliResult<impl Transport> {
    serialrw_transport::UnixSerialSocket::connect(path)
        .map_err(|err| crate::exit::transport_error("connect failed", err))
}

#[cfg(not(unix))]
fn open_link(path: &Path) -> CliResult<serialrw_transport::MockSerial> {
    Err(crate::exit::CliError::new(
        crate::exit::USAGE,
        format!("{}: socket links require Unix domain sockets", path.display()),
    ))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

/// Exit status for the state a request ended in.
fn exit_code(state: PacketState) -> i32 {
    match state {
        PacketState::ResponseReceived => SUCCESS,
        PacketState::TimedOut => TIMEOUT,
        PacketState::AwaitingAcknowledgement | PacketState::AwaitingResponse => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serialrw_packet::PacketKind;

    use super::*;

    fn args() -> SendArgs {
        SendArgs {
            path: PathBuf::from("/tmp/unused.sock"),
            kind: PacketKind::RequestPosition,
            data: None,
            file: None,
            response_timeout: "5s".to_string(),
            wait_timeout: "10s".to_string(),
        }
    }

    #[test]
    fn payload_defaults_to_empty() {
        assert!(resolve_payload(&args()).unwrap().is_empty());
    }

    #[test]
    fn payload_from_data() {
        let args = SendArgs {
            data: Some("x=1".to_string()),
            ..args()
        };
        assert_eq!(resolve_payload(&args).unwrap(), b"x=1");
    }

    #[test]
    fn missing_payload_file_fails() {
        let args = SendArgs {
            file: Some(PathBuf::from("/nonexistent/serialrw-payload.bin")),
            ..args()
        };
        assert!(resolve_payload(&args).is_err());
    }

    #[test]
    fn outcome_maps_to_exit_code() {
        assert_eq!(exit_code(PacketState::ResponseReceived), SUCCESS);
        assert_eq!(exit_code(PacketState::TimedOut), TIMEOUT);
        assert_eq!(exit_code(PacketState::AwaitingResponse), FAILURE);
    }
}
