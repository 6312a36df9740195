use std::time::{Duration, Instant};

/// Monotonic clock abstraction used for poll cadence and pulse deadlines.
///
/// - now(): returns a monotonic Instant
/// - deadline_after(): `now() + d`, saturating instead of panicking
pub trait Clock {
    fn now(&self) -> Instant;

    /// Instant `d` from now. Falls back to `now()` if the addition overflows.
    fn deadline_after(&self, d: Duration) -> Instant {
        let now = self.now();
        now.checked_add(d).unwrap_or(now)
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}
