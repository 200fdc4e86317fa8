use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use serialrw_packet::{Packet, PacketDecoder, PacketError};
use serialrw_transport::{TransportError, TransportRead};
use tracing::{debug, error, info, warn};

/// Listener worker: reads the transport, frames the bytes and queues the
/// decoded packets for the dispatcher in arrival order.
pub(crate) struct Listener<R> {
    reader: R,
    decoder: PacketDecoder,
    inbound: Sender<Packet>,
    shutdown: Receiver<()>,
    read_timeout: Duration,
}

impl<R: TransportRead> Listener<R> {
    pub(crate) fn new(
        reader: R,
        inbound: Sender<Packet>,
        shutdown: Receiver<()>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            decoder: PacketDecoder::new(),
            inbound,
            shutdown,
            read_timeout,
        }
    }

    /// Run until shutdown, transport failure, or the dispatcher going away.
    pub(crate) fn run(mut self) {
        debug!("listener started");

        while !matches!(self.shutdown.try_recv(), Err(TryRecvError::Disconnected)) {
            let bytes = match self.reader.read(self.read_timeout) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(TransportError::Closed) => {
                    info!("transport closed");
                    break;
                }
                Err(err) => {
                    error!(%err, "transport read failed");
                    break;
                }
            };

            if !self.frame(&bytes) {
                break;
            }
        }

        debug!("listener stopped");
    }

    /// Frame and queue everything decodable in the buffered bytes.
    ///
    /// Returns false once the dispatcher is gone.
    fn frame(&mut self, bytes: &[u8]) -> bool {
        self.decoder.extend(bytes);

        loop {
            match self.decoder.next_packet() {
                Ok(Some(packet)) => {
                    info!(
                        id = packet.id(),
                        kind = %packet.kind(),
                        len = packet.payload().len(),
                        "received packet {}",
                        packet
                    );
                    if self.inbound.send(packet).is_err() {
                        return false;
                    }
                }
                Ok(None) => return true,
                Err(err @ PacketError::UnsupportedKind { .. }) => {
                    warn!(%err, "unsupported packet, dropping");
                }
                Err(err) => {
                    warn!(%err, "discarding undecodable input");
                    return true;
                }
            }
        }
    }
}
