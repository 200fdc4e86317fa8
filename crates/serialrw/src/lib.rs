//! Request/acknowledgement/response packets over microcontroller serial links.
//!
//! A host sends typed requests to a device over a byte stream. The device
//! acknowledges each one and later answers with a response carrying the same
//! id. serialrw frames the packets, tracks every outstanding request and
//! times out the ones the device never answers.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-stream links (in-memory mock, Unix sockets, TCP)
//! - [`packet`]: Packet kinds, lifecycle and the wire codec
//! - [`engine`]: Packet table, listener/dispatcher workers and the `Engine`
//!   facade (behind `engine` feature)

/// Re-export transport types.
pub mod transport {
    pub use serialrw_transport::*;
}

/// Re-export packet types.
pub mod packet {
    pub use serialrw_packet::*;
}

/// Re-export engine types (requires `engine` feature).
#[cfg(feature = "engine")]
pub mod engine {
    pub use serialrw_engine::*;
}
