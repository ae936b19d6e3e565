//! Pure countdown logic for timed sessions.
//!
//! The countdown knows nothing about wall-clock scheduling; a driver calls
//! `tick` once per elapsed second.

/// Result of applying one tick to a `Countdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Time remains after this tick.
    Running { remaining: u32 },
    /// This tick consumed the last second. Reported exactly once.
    Expired,
    /// The countdown is stopped or already at zero; the tick had no effect.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    limit_secs: u32,
    remaining_secs: u32,
    running: bool,
}

impl Countdown {
    /// Creates a stopped countdown holding the full limit.
    #[must_use]
    pub fn new(limit_secs: u32) -> Self {
        Self {
            limit_secs,
            remaining_secs: limit_secs,
            running: false,
        }
    }

    #[must_use]
    pub fn limit_secs(&self) -> u32 {
        self.limit_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Reset to the full limit and start counting.
    pub fn start(&mut self) {
        self.remaining_secs = self.limit_secs;
        self.running = self.limit_secs > 0;
    }

    /// Stop counting, keeping the remaining time.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Consume one second.
    pub fn tick(&mut self) -> CountdownTick {
        if !self.running || self.remaining_secs == 0 {
            return CountdownTick::Idle;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.running = false;
            return CountdownTick::Expired;
        }
        CountdownTick::Running {
            remaining: self.remaining_secs,
        }
    }
}
