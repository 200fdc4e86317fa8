use std::fmt;

/// Lifecycle state of an outgoing packet.
///
/// Transitions only move forward:
/// - `AwaitingAcknowledgement` to `AwaitingResponse` on acknowledgement
/// - `AwaitingAcknowledgement` or `AwaitingResponse` to `ResponseReceived`
///   on response
/// - either awaiting state to `TimedOut` after prolonged silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketState {
    AwaitingAcknowledgement,
    AwaitingResponse,
    ResponseReceived,
    TimedOut,
}

impl PacketState {
    pub fn name(self) -> &'static str {
        match self {
            PacketState::AwaitingAcknowledgement => "AWAITING_ACKNOWLEDGEMENT",
            PacketState::AwaitingResponse => "AWAITING_RESPONSE",
            PacketState::ResponseReceived => "RESPONSE_RECEIVED",
            PacketState::TimedOut => "TIMED_OUT",
        }
    }

    /// No further transition leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, PacketState::ResponseReceived | PacketState::TimedOut)
    }
}

impl fmt::Display for PacketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
