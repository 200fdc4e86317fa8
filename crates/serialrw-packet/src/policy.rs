use std::time::Duration;

/// Silence after which an unanswered packet is considered lost.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// How long an answered packet keeps its id reserved.
pub const DEFAULT_OVERRIDE_GRACE: Duration = Duration::from_millis(2000);

/// Timing rules for timeout detection and id reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// A packet without a response times out once its last activity is
    /// strictly older than this.
    pub response_timeout: Duration,
    /// An answered packet becomes reusable once its response is strictly
    /// older than this.
    pub override_grace: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            override_grace: DEFAULT_OVERRIDE_GRACE,
        }
    }
}
