//! Routing of decoded frames to outstanding packets.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, select, Receiver};
use serialrw_packet::{Packet, PacketError, PacketKind, TimeoutPolicy};
use tracing::{debug, info, warn};

use crate::table::PacketTable;

/// What happened to one incoming frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The matching packet moved to `AWAITING_RESPONSE`.
    Acknowledged { id: u8 },
    /// The matching packet received its response.
    Answered { id: u8 },
    /// No packet is stored under the frame's id.
    Orphaned { id: u8, kind: PacketKind },
    /// The frame's kind is not handled here.
    Unsupported { id: u8, kind: PacketKind },
    /// The matching packet refused the frame (duplicate or late).
    Rejected { id: u8, error: PacketError },
}

/// Apply one incoming frame to the table.
///
/// Never fails: frames that cannot be applied are logged and dropped.
pub fn dispatch_at(table: &PacketTable, frame: Packet, now: Instant) -> Dispatch {
    let id = frame.id();
    let kind = frame.kind();

    let applied = match kind {
        PacketKind::Acknowledgement => table.update(id, |p| p.receive_acknowledgement_at(now)),
        PacketKind::Response => table.update(id, |p| p.receive_response_at(frame, now)),
        _ => {
            warn!(id, %kind, "unsupported packet, dropping");
            return Dispatch::Unsupported { id, kind };
        }
    };

    match applied {
        None => {
            warn!(id, %kind, "no matching sent packet, dropping");
            Dispatch::Orphaned { id, kind }
        }
        Some(Err(error)) => {
            warn!(id, %kind, %error, "frame rejected, dropping");
            Dispatch::Rejected { id, error }
        }
        Some(Ok(())) if kind == PacketKind::Acknowledgement => {
            debug!(id, "packet acknowledged");
            Dispatch::Acknowledged { id }
        }
        Some(Ok(())) => {
            debug!(id, "packet answered");
            Dispatch::Answered { id }
        }
    }
}

pub fn dispatch(table: &PacketTable, frame: Packet) -> Dispatch {
    dispatch_at(table, frame, Instant::now())
}

enum Step {
    Frame(Packet),
    Closed,
    Idle,
    Stop,
}

/// Dispatcher worker: drains the inbound queue and sweeps for timeouts
/// whenever the queue runs dry.
pub(crate) struct Dispatcher {
    table: Arc<PacketTable>,
    inbound: Receiver<Packet>,
    shutdown: Receiver<()>,
    policy: TimeoutPolicy,
    sweep_interval: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        table: Arc<PacketTable>,
        inbound: Receiver<Packet>,
        shutdown: Receiver<()>,
        policy: TimeoutPolicy,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            table,
            inbound,
            shutdown,
            policy,
            sweep_interval,
        }
    }

    /// Run until the shutdown channel closes.
    ///
    /// If the listener goes away the dispatcher keeps sweeping, so pending
    /// packets still reach `TIMED_OUT`.
    pub(crate) fn run(mut self) {
        debug!("dispatcher started");
        let mut last_sweep = Instant::now();

        loop {
            let step = select! {
                recv(self.shutdown) -> _ => Step::Stop,
                recv(self.inbound) -> frame => frame.map_or(Step::Closed, Step::Frame),
                default(self.sweep_interval) => Step::Idle,
            };

            match step {
                Step::Stop => break,
                Step::Frame(frame) => {
                    dispatch(&self.table, frame);
                    if self.inbound.is_empty() && last_sweep.elapsed() >= self.sweep_interval {
                        self.sweep();
                        last_sweep = Instant::now();
                    }
                }
                Step::Closed => {
                    debug!("inbound queue closed, sweeping only");
                    self.inbound = channel::never();
                }
                Step::Idle => {
                    self.sweep();
                    last_sweep = Instant::now();
                }
            }
        }

        debug!("dispatcher stopped");
    }

    fn sweep(&self) {
        for id in self.table.sweep(&self.policy) {
            info!(id, "packet timed out");
        }
    }
}
