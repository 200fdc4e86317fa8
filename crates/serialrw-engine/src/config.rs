use std::time::Duration;

use serialrw_packet::TimeoutPolicy;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Timeout and id-reuse rules.
    pub timeouts: TimeoutPolicy,
    /// Longest a single transport read may block. Bounds how quickly the
    /// listener notices shutdown.
    pub read_timeout: Duration,
    /// Idle time after which the dispatcher sweeps for timeouts.
    pub sweep_interval: Duration,
    /// Decoded frames buffered between listener and dispatcher.
    pub inbound_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutPolicy::default(),
            read_timeout: Duration::from_millis(10),
            sweep_interval: Duration::from_millis(25),
            inbound_capacity: 256,
        }
    }
}
