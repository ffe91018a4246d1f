//! Token-bucket-ish write pacing.
//!
//! Rate limiting here is advisory, not enforced by rejection: a writer
//! that's running ahead of its budget is made to wait before its write is
//! dispatched, but the write always eventually happens. This mirrors the
//! source's behavior of slowing producers down rather than dropping their
//! data.

use std::time::{Duration, Instant};

use crate::config::RateLimitParams;

/// Paces writes against a `bytes_per_sec` budget.
///
/// A `RateLimiter` is owned by a single hub and consulted once per
/// dispatched write. It never blocks by itself — callers `await` the
/// `Duration` it returns before proceeding.
///
/// Pacing is scheduled rather than debt-counted: each charge reserves a
/// slot on an internal timeline (`next_slot`) sized to the bytes just
/// charged, and returns how far in the future that slot sits. A quiet
/// writer always gets `next_slot <= now` and pays nothing; a writer
/// charging faster than the budget allows pushes its own next slot
/// further out each time, so a burst of charges issued back-to-back
/// accumulates wait the way a leaky bucket would.
#[derive(Debug)]
pub struct RateLimiter {
    params: RateLimitParams,
    last_charge: Instant,
    last_reset: Instant,
    next_slot: Option<Instant>,
}

impl RateLimiter {
    pub fn new(params: RateLimitParams) -> Self {
        let now = Instant::now();
        Self {
            params,
            last_charge: now,
            last_reset: now,
            next_slot: None,
        }
    }

    /// Charges `len` bytes against the budget and returns how long the
    /// caller should sleep before the write may proceed.
    ///
    /// Three independent pressures apply, matching the three CLI knobs:
    /// a flat per-write separation (`-i`), a periodic pacing reset
    /// (`-r`), and the scheduled slot against the bytes/sec budget
    /// (`-b`).
    pub fn charge(&mut self, len: usize, now: Instant) -> Duration {
        if now.duration_since(self.last_reset) >= self.params.reset {
            self.next_slot = None;
            self.last_reset = now;
        }

        let mut wait = Duration::ZERO;

        let since_last = now.duration_since(self.last_charge);
        if since_last < self.params.separation {
            wait = wait.max(self.params.separation - since_last);
        }

        if self.params.bytes_per_sec > 0 {
            let scheduled = self.next_slot.unwrap_or(now);
            let base = scheduled.max(now);
            wait = wait.max(base.duration_since(now));
            let cost = Duration::from_secs_f64(len as f64 / self.params.bytes_per_sec as f64);
            self.next_slot = Some(base + cost);
        }

        self.last_charge = now;
        wait
    }

    #[inline]
    pub fn params(&self) -> RateLimitParams {
        self.params
    }
}
