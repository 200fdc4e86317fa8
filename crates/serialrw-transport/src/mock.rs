//! In-memory serial port used by tests, the demo harness and simulators.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::Result;
use crate::traits::{Transport, TransportRead, TransportWrite};

/// A scriptable stand-in for a microcontroller serial port.
///
/// Cloning yields another handle to the same port: bytes injected through
/// any handle become readable on every handle, and bytes written through any
/// handle are recorded once they are flushed.
#[derive(Clone, Default)]
pub struct MockSerial {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    inbound: Mutex<BytesMut>,
    readable: Condvar,
    staged: Mutex<BytesMut>,
    committed: Mutex<BytesMut>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make raw bytes available to the next read.
    pub fn inject(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut inbound = self.shared.inbound.lock();
        inbound.extend_from_slice(bytes);
        trace!(len = bytes.len(), buffered = inbound.len(), "mock serial inbound");
        self.shared.readable.notify_all();
    }

    /// Make several encoded frames available as one concatenated buffer.
    pub fn inject_frames<I, B>(&self, frames: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut joined = BytesMut::new();
        for frame in frames {
            joined.extend_from_slice(frame.as_ref());
        }
        self.inject(&joined);
    }

    /// Bytes committed by `flush` so far.
    pub fn written(&self) -> Bytes {
        Bytes::copy_from_slice(&self.shared.committed.lock())
    }

    /// Drain and return the bytes committed by `flush` so far.
    pub fn take_written(&self) -> Bytes {
        self.shared.committed.lock().split().freeze()
    }

    /// Number of bytes written but not yet flushed.
    pub fn staged_len(&self) -> usize {
        self.shared.staged.lock().len()
    }

    /// Number of injected bytes not yet read.
    pub fn inbound_len(&self) -> usize {
        self.shared.inbound.lock().len()
    }
}

impl TransportRead for MockSerial {
    fn read(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let mut inbound = self.shared.inbound.lock();
        if inbound.is_empty() && !timeout.is_zero() {
            let _ = self.shared.readable.wait_for(&mut inbound, timeout);
        }
        if inbound.is_empty() {
            return Ok(None);
        }
        Ok(Some(inbound.split().freeze()))
    }
}

impl TransportWrite for MockSerial {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.shared.staged.lock().extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let staged = self.shared.staged.lock().split();
        if !staged.is_empty() {
            trace!(len = staged.len(), "mock serial flush");
            self.shared.committed.lock().unsplit(staged);
        }
        Ok(())
    }
}

impl Transport for MockSerial {
    type Reader = MockSerial;
    type Writer = MockSerial;

    fn split(self) -> Result<(Self::Reader, Self::Writer)> {
        Ok((self.clone(), self))
    }
}

impl std::fmt::Debug for MockSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerial")
            .field("inbound", &self.inbound_len())
            .field("staged", &self.staged_len())
            .finish()
    }
}
