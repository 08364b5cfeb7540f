//! Process-wide request pacing.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Spaces outbound requests evenly under a requests-per-second ceiling.
///
/// Clones share the same schedule, so every client built from one limiter is
/// paced together no matter how many tasks call it concurrently.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_sec` requests per second.
    ///
    /// A ceiling of 0 is treated as 1.
    pub fn new(requests_per_sec: u32) -> Self {
        let rps = requests_per_sec.max(1);
        Self {
            interval: Duration::from_secs(1) / rps,
            next_slot: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free slot. Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let now = Instant::now();
        let slot = {
            let mut next = self.next_slot.lock();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot
        };

        if slot > now {
            tokio::time::sleep_until(slot).await;
        }
        slot - now
    }
}
