//! Reconnect policy and retry counter.
//!
//! Delay for attempt `n` (1-based) is `base_delay * 2^(n-1)`. The counter
//! only moves forward until a socket opens successfully. An open that has not
//! finished its handshake within `connect_timeout` counts as failed.

use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Scheduled reconnects allowed between two successful opens.
    pub max_attempts: u32,
    /// Delay before the first reconnect.
    pub base_delay: Duration,
    /// Deadline for one socket handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based). Saturates.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Retry counter for one connection manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Backoff {
    attempts: u32,
}

impl Backoff {
    /// Claim the next reconnect slot. Returns the attempt number and its
    /// delay, or `None` once `policy.max_attempts` slots are used up.
    pub fn next_attempt(&mut self, policy: &ReconnectPolicy) -> Option<(u32, Duration)> {
        if self.attempts >= policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, policy.delay_for(self.attempts)))
    }

    /// Called when a socket opens.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
