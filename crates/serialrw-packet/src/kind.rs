//! Packet kinds and their wire tags.
//!
//! Tags are assigned here explicitly and never derived from declaration
//! order. A tag, once assigned, keeps its meaning; new kinds take new tags.

use std::fmt;
use std::str::FromStr;

/// Acknowledgement of a received request.
pub const ACKNOWLEDGEMENT: u8 = 0;

/// Response carrying the answer to a request.
pub const RESPONSE: u8 = 1;

/// Request for the current position.
pub const REQUEST_POSITION: u8 = 2;

/// The semantic category of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Acknowledgement,
    Response,
    RequestPosition,
}

impl PacketKind {
    /// Every registered kind.
    pub const ALL: [PacketKind; 3] = [
        PacketKind::Acknowledgement,
        PacketKind::Response,
        PacketKind::RequestPosition,
    ];

    /// Wire tag for this kind.
    pub const fn tag(self) -> u8 {
        match self {
            PacketKind::Acknowledgement => ACKNOWLEDGEMENT,
            PacketKind::Response => RESPONSE,
            PacketKind::RequestPosition => REQUEST_POSITION,
        }
    }

    /// Look up the kind registered for a wire tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            ACKNOWLEDGEMENT => Some(PacketKind::Acknowledgement),
            RESPONSE => Some(PacketKind::Response),
            REQUEST_POSITION => Some(PacketKind::RequestPosition),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Acknowledgement => "ACKNOWLEDGEMENT",
            PacketKind::Response => "RESPONSE",
            PacketKind::RequestPosition => "REQUEST_POSITION",
        }
    }

    /// True for kinds a caller sends to start an exchange.
    pub fn is_request(self) -> bool {
        !matches!(self, PacketKind::Acknowledgement | PacketKind::Response)
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PacketKind {
    type Err = String;

    /// Accepts the wire name in any case, with `-` or `_` separators, or a
    /// numeric tag.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(tag) = s.parse::<u8>() {
            return Self::from_tag(tag).ok_or_else(|| format!("unknown packet kind tag: {tag}"));
        }
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| format!("unknown packet kind: {s}"))
    }
}
