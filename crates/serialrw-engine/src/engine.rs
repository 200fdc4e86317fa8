use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use serialrw_packet::{Packet, PacketKind, HEADER_SIZE};
use serialrw_transport::{Transport, TransportWrite};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, Result};
use crate::listener::Listener;
use crate::table::PacketTable;

const LISTENER_THREAD: &str = "serialrw-listener";
const DISPATCHER_THREAD: &str = "serialrw-dispatcher";

/// Poll interval used by [`Engine::wait`].
const WAIT_POLL: Duration = Duration::from_millis(5);

/// Request/acknowledgement/response engine over one transport.
///
/// `send` and `query` may be called from any number of threads. Dropping the
/// engine signals shutdown without waiting; use [`Engine::close`] to also join
/// the worker threads.
pub struct Engine {
    table: Arc<PacketTable>,
    writer: Mutex<Box<dyn TransportWrite>>,
    config: EngineConfig,
    shutdown: Mutex<Option<Sender<()>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Start an engine with default configuration.
    pub fn start<T: Transport>(transport: T) -> Result<Self> {
        Self::with_config(transport, EngineConfig::default())
    }

    /// Split `transport` and start the listener and dispatcher threads.
    pub fn with_config<T: Transport>(transport: T, config: EngineConfig) -> Result<Self> {
        let (reader, writer) = transport.split()?;
        let table = Arc::new(PacketTable::new());

        let (inbound_tx, inbound_rx) = channel::bounded(config.inbound_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let listener = Listener::new(
            reader,
            inbound_tx,
            shutdown_rx.clone(),
            config.read_timeout,
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&table),
            inbound_rx,
            shutdown_rx,
            config.timeouts,
            config.sweep_interval,
        );

        let dispatcher = spawn(DISPATCHER_THREAD, move || dispatcher.run())?;
        // If this fails, shutdown_tx drops on return and the dispatcher exits.
        let listener = spawn(LISTENER_THREAD, move || listener.run())?;

        debug!(
            response_timeout_ms = config.timeouts.response_timeout.as_millis() as u64,
            override_grace_ms = config.timeouts.override_grace.as_millis() as u64,
            "engine started"
        );

        Ok(Self {
            table,
            writer: Mutex::new(Box::new(writer)),
            config,
            shutdown: Mutex::new(Some(shutdown_tx)),
            workers: Mutex::new(vec![listener, dispatcher]),
        })
    }

    /// Send a packet and return its id.
    ///
    /// The packet is stored before it hits the wire, so an acknowledgement
    /// can never race ahead of it. The writer lock is held from allocation
    /// through flush, so ids reach the wire in allocation order. If the
    /// write fails the packet is removed again and the transport error is
    /// returned.
    pub fn send(&self, kind: PacketKind, payload: impl Into<Bytes>) -> Result<u8> {
        if !self.is_running() {
            return Err(EngineError::Shutdown);
        }
        let payload = payload.into();

        let mut writer = self.writer.lock();
        let packet = self.table.allocate(kind, payload, &self.config.timeouts)?;
        let id = packet.id();

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + packet.payload().len());
        packet.encode_into(&mut frame)?;

        let written = writer.write(&frame).and_then(|()| writer.flush());
        drop(writer);
        if let Err(err) = written {
            warn!(id, %err, "write failed, discarding packet");
            self.table.discard(id, packet.time_sent());
            return Err(err.into());
        }

        info!(
            id,
            kind = %kind,
            len = packet.payload().len(),
            "sent packet {}",
            packet
        );
        Ok(id)
    }

    /// Current snapshot of the packet sent under `id`.
    pub fn query(&self, id: u8) -> Result<Packet> {
        self.table.get(id)
    }

    /// Poll `id` until it reaches a terminal state or `timeout` elapses.
    ///
    /// Returns the last snapshot either way. A `timeout` too large to add to
    /// the current instant waits for a terminal state with no deadline.
    pub fn wait(&self, id: u8, timeout: Duration) -> Result<Packet> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let packet = self.query(id)?;
            if packet.state().is_terminal() {
                return Ok(packet);
            }
            let pause = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(packet);
                    }
                    WAIT_POLL.min(left)
                }
                None => WAIT_POLL,
            };
            thread::sleep(pause);
        }
    }

    /// Ids currently held in the packet table, in ascending order.
    pub fn outstanding(&self) -> Vec<u8> {
        self.table.ids()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.lock().is_some()
    }

    /// Signal both workers to stop. Never blocks; idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.lock().take().is_some() {
            debug!("engine shutdown requested");
        }
    }

    /// Shut down and wait for both workers to exit.
    pub fn close(self) {
        self.shutdown();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let name = worker.thread().name().unwrap_or("worker").to_string();
            if worker.join().is_err() {
                error!(thread = %name, "worker panicked");
            }
        }
        debug!("engine closed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("table", &self.table)
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

fn spawn(name: &'static str, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(|source| EngineError::Spawn { name, source })
}
