use std::fmt;

use crate::state::PacketState;

/// Which lifecycle timestamp an operation tried to set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Sent,
    AckReceived,
    ResponseReceived,
}

impl fmt::Display for TimestampField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TimestampField::Sent => "time sent",
            TimestampField::AckReceived => "time acknowledgement received",
            TimestampField::ResponseReceived => "time response received",
        })
    }
}

/// Errors that can occur while encoding, decoding or advancing a packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The payload does not fit the single-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    EncodingTooLarge { size: usize, max: usize },

    /// The frame carries a kind tag with no registered kind.
    #[error("unsupported packet kind tag {tag} (packet {id})")]
    UnsupportedKind { id: u8, tag: u8 },

    /// The length byte is smaller than the frame header.
    #[error("malformed frame: length byte {length} is shorter than the header")]
    MalformedFrame { length: u8 },

    /// Fewer bytes were supplied than the length byte announced.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// A lifecycle timestamp was set twice.
    #[error("{field} already set on packet {id}")]
    DuplicateTimestamp { id: u8, field: TimestampField },

    /// The event is not allowed in the packet's current state.
    #[error("packet {id} cannot accept {event} while {from}")]
    InvalidTransition {
        id: u8,
        from: PacketState,
        event: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, PacketError>;
