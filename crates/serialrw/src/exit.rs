use std::fmt;
use std::io;

use serialrw_engine::EngineError;
use serialrw_packet::PacketError;
use serialrw_transport::TransportError;

// Exit codes follow sysexits/coreutils conventions where one applies.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const BUSY: i32 = 75;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Closed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn packet_error(context: &str, err: PacketError) -> CliError {
    match err {
        PacketError::EncodingTooLarge { .. }
        | PacketError::UnsupportedKind { .. }
        | PacketError::MalformedFrame { .. }
        | PacketError::Truncated { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn engine_error(context: &str, err: EngineError) -> CliError {
    match err {
        EngineError::Transport(err) => transport_error(context, err),
        EngineError::Packet(err) => packet_error(context, err),
        EngineError::BufferOverflow { .. } => CliError::new(BUSY, format!("{context}: {err}")),
        EngineError::InvalidPacketId(_) => CliError::new(USAGE, format!("{context}: {err}")),
        EngineError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
        EngineError::Spawn { source, .. } => io_error(context, source),
    }
}
