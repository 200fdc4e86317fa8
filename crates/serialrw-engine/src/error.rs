/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialrw_transport::TransportError),

    /// Packet-level error (encoding, lifecycle).
    #[error("packet error: {0}")]
    Packet(#[from] serialrw_packet::PacketError),

    /// Every id is taken: the next one still belongs to a live packet.
    #[error("packet buffer overflow: id {id} is still in use")]
    BufferOverflow { id: u8 },

    /// No packet has been sent with this id.
    #[error("no packet with id {0}")]
    InvalidPacketId(u8),

    /// The engine has been shut down.
    #[error("engine shut down")]
    Shutdown,

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
