//! Packet framing and request lifecycle state.
//!
//! Every frame on the wire is:
//! - a 1-byte total length (header included)
//! - a 1-byte packet id
//! - a 1-byte kind tag
//! - up to 252 payload bytes
//!
//! There is no magic number and no checksum; the length byte is the only
//! framing information. [`Packet`] also carries the timestamps and state that
//! track an outgoing request from send to acknowledgement to response.

pub mod codec;
pub mod error;
pub mod kind;
pub mod packet;
pub mod policy;
pub mod state;

pub use codec::{
    decode_packet, encode_packet, PacketDecoder, HEADER_SIZE, MAX_FRAME_LEN, MAX_PAYLOAD,
};
pub use error::{PacketError, Result, TimestampField};
pub use kind::{PacketKind, ACKNOWLEDGEMENT, REQUEST_POSITION, RESPONSE};
pub use packet::Packet;
pub use policy::{TimeoutPolicy, DEFAULT_OVERRIDE_GRACE, DEFAULT_RESPONSE_TIMEOUT};
pub use state::PacketState;
