use std::borrow::Cow;
use std::fmt;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::codec::{decode_packet, encode_packet, HEADER_SIZE};
use crate::error::{PacketError, Result, TimestampField};
use crate::kind::PacketKind;
use crate::policy::TimeoutPolicy;
use crate::state::PacketState;

/// One request/response exchange, or one decoded incoming frame.
///
/// Outgoing packets start in [`PacketState::AwaitingAcknowledgement`] and are
/// advanced by the engine as acknowledgement and response frames arrive.
/// Each lifecycle timestamp can be set once. Every time-dependent operation
/// has an `_at` variant taking an explicit `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    id: u8,
    kind: PacketKind,
    payload: Bytes,
    state: PacketState,
    time_sent: Option<Instant>,
    time_ack_received: Option<Instant>,
    time_response_received: Option<Instant>,
    response: Option<Box<Packet>>,
}

impl Packet {
    /// Create a packet that has not been sent yet.
    pub fn new(id: u8, kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind,
            payload: payload.into(),
            state: PacketState::AwaitingAcknowledgement,
            time_sent: None,
            time_ack_received: None,
            time_response_received: None,
            response: None,
        }
    }

    /// Decode exactly one frame.
    ///
    /// Bytes after the announced length are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::from(bytes);
        match decode_packet(&mut buf)? {
            Some(packet) => Ok(packet),
            None => Err(PacketError::Truncated {
                expected: bytes.first().map_or(HEADER_SIZE, |&len| len as usize),
                actual: bytes.len(),
            }),
        }
    }

    /// Encode this packet as one frame.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append this packet's frame to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        encode_packet(self.id, self.kind, &self.payload, dst)
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    pub fn state(&self) -> PacketState {
        self.state
    }

    pub fn time_sent(&self) -> Option<Instant> {
        self.time_sent
    }

    pub fn time_ack_received(&self) -> Option<Instant> {
        self.time_ack_received
    }

    pub fn time_response_received(&self) -> Option<Instant> {
        self.time_response_received
    }

    /// The response frame, once one has been received.
    pub fn response(&self) -> Option<&Packet> {
        self.response.as_deref()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.time_ack_received.is_some()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Record the moment this packet was handed to the transport.
    pub fn mark_sent_at(&mut self, now: Instant) -> Result<()> {
        if self.time_sent.is_some() {
            return Err(self.duplicate(TimestampField::Sent));
        }
        self.time_sent = Some(now);
        Ok(())
    }

    pub fn mark_sent(&mut self) -> Result<()> {
        self.mark_sent_at(Instant::now())
    }

    /// Record an acknowledgement and start waiting for the response.
    pub fn receive_acknowledgement_at(&mut self, now: Instant) -> Result<()> {
        if self.time_ack_received.is_some() {
            return Err(self.duplicate(TimestampField::AckReceived));
        }
        if self.state.is_terminal() {
            return Err(self.invalid("an acknowledgement"));
        }
        self.time_ack_received = Some(now);
        self.state = PacketState::AwaitingResponse;
        Ok(())
    }

    pub fn receive_acknowledgement(&mut self) -> Result<()> {
        self.receive_acknowledgement_at(Instant::now())
    }

    /// Attach the response frame and complete the exchange.
    ///
    /// A missing acknowledgement is tolerated: the response implies it.
    pub fn receive_response_at(&mut self, response: Packet, now: Instant) -> Result<()> {
        if self.time_response_received.is_some() {
            return Err(self.duplicate(TimestampField::ResponseReceived));
        }
        if self.state == PacketState::TimedOut {
            return Err(self.invalid("a response"));
        }
        self.time_response_received = Some(now);
        self.response = Some(Box::new(response));
        self.state = PacketState::ResponseReceived;
        Ok(())
    }

    pub fn receive_response(&mut self, response: Packet) -> Result<()> {
        self.receive_response_at(response, Instant::now())
    }

    /// Most recent sign of life: response, else acknowledgement, else send.
    pub fn last_active_time(&self) -> Option<Instant> {
        self.time_response_received
            .or(self.time_ack_received)
            .or(self.time_sent)
    }

    /// Check for a timeout, moving the packet to [`PacketState::TimedOut`]
    /// when one is found.
    ///
    /// Answered packets never time out. Packets that were never sent have no
    /// activity to measure and do not time out either.
    pub fn detect_timeout_at(&mut self, now: Instant, policy: &TimeoutPolicy) -> bool {
        if self.time_response_received.is_some() {
            return false;
        }
        let Some(last_active) = self.last_active_time() else {
            return false;
        };

        let timed_out = now.saturating_duration_since(last_active) > policy.response_timeout;
        if timed_out {
            self.state = PacketState::TimedOut;
        }
        timed_out
    }

    pub fn detect_timeout(&mut self, policy: &TimeoutPolicy) -> bool {
        self.detect_timeout_at(Instant::now(), policy)
    }

    /// Whether this packet's id may be handed to a new packet.
    ///
    /// True once the packet has timed out, or once its response is older
    /// than the policy's grace period. Runs timeout detection as a side
    /// effect.
    pub fn safe_to_override_at(&mut self, now: Instant, policy: &TimeoutPolicy) -> bool {
        if self.detect_timeout_at(now, policy) {
            return true;
        }
        self.time_response_received
            .is_some_and(|at| now.saturating_duration_since(at) > policy.override_grace)
    }

    pub fn safe_to_override(&mut self, policy: &TimeoutPolicy) -> bool {
        self.safe_to_override_at(Instant::now(), policy)
    }

    /// Time from send to response, when both are known.
    pub fn round_trip(&self) -> Option<Duration> {
        match (self.time_sent, self.time_response_received) {
            (Some(sent), Some(received)) => Some(received.saturating_duration_since(sent)),
            _ => None,
        }
    }

    fn duplicate(&self, field: TimestampField) -> PacketError {
        PacketError::DuplicateTimestamp { id: self.id, field }
    }

    fn invalid(&self, event: &'static str) -> PacketError {
        PacketError::InvalidTransition {
            id: self.id,
            from: self.state,
            event,
        }
    }
}

/// One-line JSON summary used in logs.
impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payload =
            serde_json::to_string(self.payload_as_str().as_ref()).map_err(|_| fmt::Error)?;
        write!(
            f,
            "{{\"id\":{},\"kind\":\"{}\",\"state\":\"{}\",\"payload\":{},\"response\":",
            self.id, self.kind, self.state, payload
        )?;
        match &self.response {
            Some(response) => write!(f, "{response}}}"),
            None => f.write_str("null}"),
        }
    }
}
