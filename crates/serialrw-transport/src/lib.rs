//! Byte-oriented transport abstraction.
//!
//! The protocol engine only needs three operations from a link: stage bytes,
//! commit them, and read whatever bytes are currently available. This crate
//! provides:
//! - [`MockSerial`], an in-memory stand-in for a microcontroller serial port
//! - [`StreamTransport`], an adapter over any cloneable std stream
//! - [`UnixSerialSocket`], a Unix domain socket endpoint for bridged serial
//!   devices and simulators (Unix only)
//!
//! This is the lowest layer of serialrw. Everything else builds on the
//! [`Transport`] split into a [`TransportRead`] half and a
//! [`TransportWrite`] half.

pub mod error;
pub mod mock;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use mock::MockSerial;
pub use stream::{SerialStream, StreamReader, StreamTransport, StreamWriter};
pub use traits::{Transport, TransportRead, TransportWrite};

#[cfg(unix)]
pub use uds::UnixSerialSocket;
