//! Connectivity state machine with bounded retries
//!
//! ```text
//!   Disconnected --begin_attempt--> Connecting --link up--> Connected
//!        ^                              |                       |
//!        +------ failed, retries left --+                       |
//!        +-------------------------------------- link lost -----+
//!                                       |
//!   Degraded <-- failed, retries spent -+
//!      |  ^
//!      |  +-- failed probe
//!      +-- degraded_retry_ms elapsed --> Connecting
//! ```
//!
//! The machine is pure: the caller feeds it the current time in milliseconds
//! and link events, and asks [`LinkManager::poll`] what to do next. Sampling
//! never waits on it.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::ConfigError;

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// How long one attempt may wait for the link (DHCP lease) to come up
    pub attempt_timeout_ms: u32,
    /// Pause between attempts within a burst
    pub backoff_ms: u32,
    /// Attempts before giving up and going Degraded
    pub max_attempts: u8,
    /// Interval between single probe attempts while Degraded
    pub degraded_retry_ms: u32,
}

impl LinkConfig {
    /// Check for a policy that could never connect
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.attempt_timeout_ms == 0 {
            return Err(ConfigError::InvalidLinkConfig);
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 10_000,
            backoff_ms: 2_000,
            max_attempts: 5,
            degraded_retry_ms: 300_000,
        }
    }
}

/// Connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkState {
    /// No link, next attempt scheduled
    Disconnected = 0,
    /// Attempt in flight
    Connecting = 1,
    /// Link up
    Connected = 2,
    /// Retries exhausted; running offline with slow probing
    Degraded = 3,
}

impl LinkState {
    /// Decode from the value stored by [`SharedLinkState`]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Degraded,
            _ => Self::Disconnected,
        }
    }

    /// Lowercase label for logs
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        }
    }
}

/// What the link driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkAction {
    /// Call [`LinkManager::begin_attempt`] and bring the link up
    StartAttempt,
    /// Wait for the link to come up, but no later than `deadline_ms`
    AwaitLink { deadline_ms: u64 },
    /// Nothing to do before this time
    WaitUntil(u64),
    /// Link is up; wait for it to drop
    Monitor,
}

/// Bounded-retry connectivity manager
#[derive(Debug, Clone)]
pub struct LinkManager {
    config: LinkConfig,
    state: LinkState,
    attempt: u8,
    degraded: bool,
    next_attempt_ms: u64,
    deadline_ms: u64,
}

impl LinkManager {
    /// Start Disconnected with an attempt due immediately
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: LinkState::Disconnected,
            attempt: 0,
            degraded: false,
            next_attempt_ms: 0,
            deadline_ms: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Attempt number within the current burst (1-based, 0 when idle)
    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    /// Decide the next action, expiring an overdue attempt first
    pub fn poll(&mut self, now_ms: u64) -> LinkAction {
        if self.state == LinkState::Connecting && now_ms >= self.deadline_ms {
            #[cfg(feature = "defmt")]
            defmt::warn!("Link attempt {} timed out", self.attempt);
            self.on_attempt_failed(now_ms);
        }

        match self.state {
            LinkState::Disconnected | LinkState::Degraded => {
                if now_ms >= self.next_attempt_ms {
                    LinkAction::StartAttempt
                } else {
                    LinkAction::WaitUntil(self.next_attempt_ms)
                }
            }
            LinkState::Connecting => LinkAction::AwaitLink {
                deadline_ms: self.deadline_ms,
            },
            LinkState::Connected => LinkAction::Monitor,
        }
    }

    /// Mark an attempt as started; returns its deadline
    pub fn begin_attempt(&mut self, now_ms: u64) -> u64 {
        self.attempt = if self.degraded {
            1
        } else {
            self.attempt.saturating_add(1)
        };
        self.deadline_ms = now_ms + self.config.attempt_timeout_ms as u64;
        self.transition(LinkState::Connecting);
        self.deadline_ms
    }

    /// The link came up
    pub fn on_link_up(&mut self, _now_ms: u64) {
        self.attempt = 0;
        self.degraded = false;
        self.transition(LinkState::Connected);
    }

    /// The attempt in flight failed
    pub fn on_attempt_failed(&mut self, now_ms: u64) {
        if self.state != LinkState::Connecting {
            return;
        }
        if self.degraded || self.attempt >= self.config.max_attempts {
            self.degraded = true;
            self.next_attempt_ms = now_ms + self.config.degraded_retry_ms as u64;
            self.transition(LinkState::Degraded);
        } else {
            self.next_attempt_ms = now_ms + self.config.backoff_ms as u64;
            self.transition(LinkState::Disconnected);
        }
    }

    /// An established link dropped; retry right away with a fresh burst
    pub fn on_link_lost(&mut self, now_ms: u64) {
        if self.state != LinkState::Connected {
            return;
        }
        self.attempt = 0;
        self.next_attempt_ms = now_ms;
        self.transition(LinkState::Disconnected);
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            #[cfg(feature = "defmt")]
            defmt::info!("Link {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }
}

/// Link state published for other tasks (heartbeat, status line)
pub struct SharedLinkState(AtomicU8);

impl SharedLinkState {
    /// Start as Disconnected
    pub const fn new() -> Self {
        Self(AtomicU8::new(LinkState::Disconnected as u8))
    }

    /// Publish a state
    pub fn set(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Read the last published state
    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }
}

impl Default for SharedLinkState {
    fn default() -> Self {
        Self::new()
    }
}
