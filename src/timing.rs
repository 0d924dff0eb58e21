//! Level-triggered transition gate.
//!
//! The gate fires when `now >= deadline` and is re-armed from the time of
//! the call, so a late caller gets one transition and the missed periods
//! are dropped.

use std::time::Instant;

/// Monotonic millisecond source for the driving loop.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone)]
pub struct TimingGate {
    period_ms: u64,
    next_deadline: u64,
}

impl TimingGate {
    /// A gate that is due immediately at `now`.
    pub fn new(period_ms: u32, now: u64) -> Self {
        TimingGate {
            period_ms: u64::from(period_ms),
            next_deadline: now,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        now >= self.next_deadline
    }

    /// Schedule the next deadline one period after `now`.
    pub fn arm(&mut self, now: u64) {
        self.next_deadline = now.saturating_add(self.period_ms);
    }

    /// Takes effect from the next `arm`; the pending deadline is kept.
    pub fn set_period(&mut self, period_ms: u32) {
        self.period_ms = u64::from(period_ms);
    }

    pub fn next_deadline(&self) -> u64 {
        self.next_deadline
    }
}
