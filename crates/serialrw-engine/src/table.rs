//! Outstanding-packet table.
//!
//! One slot per possible id, each behind its own lock, so inserts, reads and
//! lifecycle updates on different ids never contend and every operation on a
//! single id is atomic. Nothing here needs more than one slot at a time.

use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use serialrw_packet::{Packet, PacketError, PacketKind, PacketState, TimeoutPolicy, MAX_PAYLOAD};
use tracing::debug;

use crate::error::{EngineError, Result};

/// Number of distinct packet ids.
pub const TABLE_SIZE: usize = u8::MAX as usize + 1;

/// Concurrent id → packet map for outgoing requests.
pub struct PacketTable {
    slots: Box<[Mutex<Option<Packet>>]>,
    next_id: Mutex<u8>,
}

impl PacketTable {
    pub fn new() -> Self {
        Self {
            slots: (0..TABLE_SIZE).map(|_| Mutex::new(None)).collect(),
            next_id: Mutex::new(0),
        }
    }

    /// Claim the next id and store a new packet, stamped as sent at `now`.
    ///
    /// Ids are handed out in increasing order, wrapping after 255. If the
    /// previous occupant of the id is not yet safe to override, nothing is
    /// stored, the counter stays put and [`EngineError::BufferOverflow`] is
    /// returned. Claiming the id, checking the slot and storing the packet
    /// happen under one lock, so concurrent callers never share an id.
    pub fn allocate_at(
        &self,
        kind: PacketKind,
        payload: Bytes,
        policy: &TimeoutPolicy,
        now: Instant,
    ) -> Result<Packet> {
        if payload.len() > MAX_PAYLOAD {
            return Err(PacketError::EncodingTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD,
            }
            .into());
        }

        let mut next_id = self.next_id.lock();
        let id = *next_id;
        let mut slot = self.slots[id as usize].lock();

        if let Some(previous) = slot.as_mut() {
            if !previous.safe_to_override_at(now, policy) {
                return Err(EngineError::BufferOverflow { id });
            }
            debug!(id, previous_state = %previous.state(), "reusing packet id");
        }

        let mut packet = Packet::new(id, kind, payload);
        packet.mark_sent_at(now)?;
        *slot = Some(packet.clone());
        *next_id = id.wrapping_add(1);

        Ok(packet)
    }

    pub fn allocate(
        &self,
        kind: PacketKind,
        payload: Bytes,
        policy: &TimeoutPolicy,
    ) -> Result<Packet> {
        self.allocate_at(kind, payload, policy, Instant::now())
    }

    /// Snapshot of the packet stored under `id`.
    pub fn get(&self, id: u8) -> Result<Packet> {
        self.slots[id as usize]
            .lock()
            .clone()
            .ok_or(EngineError::InvalidPacketId(id))
    }

    /// Run `f` on the packet stored under `id`, if any.
    pub fn update<R>(&self, id: u8, f: impl FnOnce(&mut Packet) -> R) -> Option<R> {
        self.slots[id as usize].lock().as_mut().map(f)
    }

    /// Remove the packet under `id` if it is still the one sent at `sent_at`.
    pub fn discard(&self, id: u8, sent_at: Option<Instant>) -> Option<Packet> {
        let mut slot = self.slots[id as usize].lock();
        if slot.as_ref().map(Packet::time_sent) == Some(sent_at) {
            slot.take()
        } else {
            None
        }
    }

    /// Run timeout detection on every stored packet.
    ///
    /// Returns the ids that timed out during this sweep.
    pub fn sweep_at(&self, now: Instant, policy: &TimeoutPolicy) -> Vec<u8> {
        let mut timed_out = Vec::new();
        for (id, slot) in self.slots.iter().enumerate() {
            let mut slot = slot.lock();
            let Some(packet) = slot.as_mut() else {
                continue;
            };
            let was_timed_out = packet.state() == PacketState::TimedOut;
            if packet.detect_timeout_at(now, policy) && !was_timed_out {
                timed_out.push(id as u8);
            }
        }
        timed_out
    }

    pub fn sweep(&self, policy: &TimeoutPolicy) -> Vec<u8> {
        self.sweep_at(Instant::now(), policy)
    }

    /// Ids currently holding a packet, in ascending order.
    pub fn ids(&self) -> Vec<u8> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.lock().is_some())
            .map(|(id, _)| id as u8)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PacketTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PacketTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketTable")
            .field("live", &self.len())
            .field("next_id", &*self.next_id.lock())
            .finish()
    }
}
