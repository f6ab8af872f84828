//! [`TimeoutTimer`] – single-deadline segment timer.
//!
//! The timer is armed once per run from a monotonic [`Instant`] and never
//! re-armed.  Callers pass `now` explicitly so the same code runs against
//! the real clock and a paused test clock.

use std::time::{Duration, Instant};

/// Monotonic deadline for one segment.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use conechase_kernel::timeout::TimeoutTimer;
///
/// let start = Instant::now();
/// let timer = TimeoutTimer::arm(start, Duration::from_secs(5));
///
/// assert!(!timer.expired(start + Duration::from_secs(5)));
/// assert!(timer.expired(start + Duration::from_millis(5001)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTimer {
    /// `None` when `now + duration` is not representable; such a timer never
    /// expires.
    deadline: Option<Instant>,
}

impl TimeoutTimer {
    /// Arm a timer whose deadline is `now + duration`.
    pub fn arm(now: Instant, duration: Duration) -> Self {
        Self {
            deadline: now.checked_add(duration),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once `now` is strictly past the deadline.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::MAX,
        }
    }

    /// Whole seconds left, used for countdown logging.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        self.remaining(now).as_secs()
    }
}
