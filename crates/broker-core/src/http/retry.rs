//! Bounded attempt policy for the request executor
//!
//! Every logical request runs through at most `max_attempts` exchanges. An
//! authentication redo uses up an attempt without waiting; a retryable
//! gateway error waits one backoff step first.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of exchanges for one logical request
    pub max_attempts: u32,
    /// First backoff delay (in milliseconds)
    pub initial_delay_ms: u64,
    /// Cap on any single backoff delay (in milliseconds)
    pub max_delay_ms: u64,
    /// Whether to randomise delays
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Policy that retries immediately, for tests and local brokers
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }

    /// Create an exponential backoff instance
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_delay_ms),
            current_interval: Duration::from_millis(self.initial_delay_ms),
            max_interval: Duration::from_millis(self.max_delay_ms),
            max_elapsed_time: None,
            ..Default::default()
        };
        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }
        backoff
    }
}

/// Where one attempt of a request currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Options are being merged, signed and attached to a transport
    Building,
    /// The exchange is in flight
    Sent,
    /// The auth provider asked for a fresh attempt
    AuthChallenge,
    /// A 502 on the first GET attempt; waiting before trying again
    RetryableGatewayError,
    Success,
    Failed,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AttemptState::Success | AttemptState::Failed)
    }
}

/// Attempt bookkeeping for one logical request
#[derive(Debug)]
pub struct AttemptTracker {
    policy: RetryPolicy,
    backoff: ExponentialBackoff,
    attempt: u32,
    state: AttemptState,
}

impl AttemptTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            backoff,
            attempt: 0,
            state: AttemptState::Building,
        }
    }

    /// Zero-based index of the current attempt
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn transition(&mut self, next: AttemptState) {
        log::trace!("Attempt {}: {:?} -> {:?}", self.attempt, self.state, next);
        self.state = next;
    }

    /// Whether a 502 should be retried: only on the first attempt of a GET
    pub fn gateway_retry_allowed(&self, is_get: bool) -> bool {
        self.attempt == 0 && is_get
    }

    /// Move to the next attempt. Returns the delay to wait first, or `None`
    /// when the policy is exhausted.
    pub fn advance(&mut self) -> Option<Duration> {
        if self.attempt + 1 >= self.policy.max_attempts {
            return None;
        }
        let delay = match self.state {
            AttemptState::RetryableGatewayError => self.backoff.next_backoff().unwrap_or_default(),
            _ => Duration::ZERO,
        };
        self.attempt += 1;
        self.state = AttemptState::Building;
        Some(delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}
