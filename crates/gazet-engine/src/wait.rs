//! Bounded polling primitive. Every wait in the engine goes through a deadline.

use tokio::time::{Duration, Instant};

/// One readiness check.
#[derive(Debug, Clone, PartialEq)]
pub enum Check<T> {
    Ready(T),
    /// Not there yet, keep polling.
    Pending,
    /// Can never become ready; stop now.
    Gone,
}

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Fixed-interval ticker with an absolute deadline.
#[derive(Debug, Clone)]
pub struct Poller {
    deadline: Instant,
    interval: Duration,
    ticks: u32,
}

impl Poller {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            deadline: now
                .checked_add(timeout)
                .unwrap_or_else(|| now + FAR_FUTURE),
            interval,
            ticks: 0,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Sleep one interval, clipped to the deadline. Returns false once the
    /// deadline has already passed, so the caller gets a final check at the
    /// deadline and then stops.
    pub async fn tick(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let remaining = self.deadline - now;
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.ticks += 1;
        true
    }
}
