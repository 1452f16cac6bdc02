//! Periodic deadlines for the cooperative main loop.
//!
//! Nothing in the client may sleep once steady-state polling starts, so
//! every "do this at most every N ms" rule is an [`Interval`] checked
//! against the monotonic clock on each tick:
//!
//! ```text
//!  loop ──▶ Interval::ready(now)? ──yes──▶ run work, re-arm at `now`
//!                  │
//!                  no ──▶ skip (costs one subtraction)
//! ```
//!
//! Users:
//! - the command queue pass (100 ms throttle)
//! - the console telemetry and statistics reports in `main`

/// A fixed-period gate.
///
/// The first call to [`ready`](Self::ready) always fires; afterwards it
/// fires once `period_ms` has elapsed since the last fire. Missed periods
/// are not replayed.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    period_ms: u64,
    last_fire_ms: Option<u64>,
}

impl Interval {
    pub const fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_fire_ms: None,
        }
    }

    /// A zero-period interval never fires.
    pub const fn is_disabled(&self) -> bool {
        self.period_ms == 0
    }

    /// Returns `true` and re-arms if the interval is due at `now_ms`.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        if self.is_disabled() {
            return false;
        }
        let due = match self.last_fire_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.period_ms,
        };
        if due {
            self.last_fire_ms = Some(now_ms);
        }
        due
    }

    /// Forget the last fire so the next check fires immediately.
    pub fn reset(&mut self) {
        self.last_fire_ms = None;
    }
}
