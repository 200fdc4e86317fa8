use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{Transport, TransportRead, TransportWrite};

const READ_CHUNK_SIZE: usize = 1024;
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// A std stream usable as a serial link.
///
/// Both halves of the link own a handle to the same underlying descriptor,
/// so the stream must be cloneable and support read timeouts.
pub trait SerialStream: Read + Write + Send + Sized + 'static {
    /// Create a second handle to the same stream.
    fn try_clone_link(&self) -> std::io::Result<Self>;

    /// Bound how long a read may block.
    fn set_link_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

#[cfg(unix)]
impl SerialStream for std::os::unix::net::UnixStream {
    fn try_clone_link(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn set_link_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.set_read_timeout(timeout)
    }
}

impl SerialStream for std::net::TcpStream {
    fn try_clone_link(&self) -> std::io::Result<Self> {
        self.try_clone()
    }

    fn set_link_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.set_read_timeout(timeout)
    }
}

/// Serial link over a [`SerialStream`].
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S: SerialStream> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: SerialStream> Transport for StreamTransport<S> {
    type Reader = StreamReader<S>;
    type Writer = StreamWriter<S>;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        let reader_stream = self.stream.try_clone_link()?;
        Ok((
            StreamReader {
                stream: reader_stream,
                timeout: None,
            },
            StreamWriter {
                stream: self.stream,
                staged: BytesMut::new(),
            },
        ))
    }
}

/// Reading half of a [`StreamTransport`].
#[derive(Debug)]
pub struct StreamReader<S> {
    stream: S,
    timeout: Option<Duration>,
}

impl<S: SerialStream> TransportRead for StreamReader<S> {
    fn read(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        // A zero read timeout is rejected by std; poll with the smallest one.
        let timeout = timeout.max(MIN_READ_TIMEOUT);
        if self.timeout != Some(timeout) {
            self.stream.set_link_read_timeout(Some(timeout))?;
            self.timeout = Some(timeout);
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.stream.read(&mut chunk) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => {
                trace!(len = n, "stream read");
                Ok(Some(Bytes::copy_from_slice(&chunk[..n])))
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

/// Writing half of a [`StreamTransport`].
#[derive(Debug)]
pub struct StreamWriter<S> {
    stream: S,
    staged: BytesMut,
}

impl<S: SerialStream> TransportWrite for StreamWriter<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.staged.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.staged.len() {
            match self.stream.write(&self.staged[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.staged.clear();

        loop {
            match self.stream.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}
