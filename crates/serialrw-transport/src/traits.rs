use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Receiving half of a link.
pub trait TransportRead: Send {
    /// Wait up to `timeout` for incoming bytes.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A returned buffer holds
    /// whatever was available: zero or more concatenated frames, possibly
    /// followed by the start of another one. A zero timeout polls.
    fn read(&mut self, timeout: Duration) -> Result<Option<Bytes>>;
}

/// Sending half of a link.
pub trait TransportWrite: Send {
    /// Stage outgoing bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Commit everything staged so far.
    fn flush(&mut self) -> Result<()>;
}

/// A full-duplex link that can be split into independently owned halves.
///
/// The engine reads on one thread and writes from caller threads, so each
/// half must be usable without locking the other.
pub trait Transport {
    type Reader: TransportRead + 'static;
    type Writer: TransportWrite + 'static;

    /// Split the link into its reading and writing halves.
    fn split(self) -> Result<(Self::Reader, Self::Writer)>;
}

impl<T: TransportRead + ?Sized> TransportRead for Box<T> {
    fn read(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        (**self).read(timeout)
    }
}

impl<T: TransportWrite + ?Sized> TransportWrite for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
