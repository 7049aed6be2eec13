use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time of the last host activity, shareable between the polling loop and
/// the head-select context.
#[derive(Debug)]
pub struct ActivityClock {
    epoch: Instant,
    last_us: AtomicU64,  // Microseconds since `epoch`.
}

impl ActivityClock {
    pub fn new() -> Self {
        ActivityClock {
            epoch: Instant::now(),
            last_us: AtomicU64::new(0),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let now = self.epoch.elapsed().as_micros() as u64;
        self.last_us.fetch_max(now, Ordering::AcqRel);
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_micros() as u64;
        Duration::from_micros(now.saturating_sub(self.last_us.load(Ordering::Acquire)))
    }

    /// True once the host has been quiet for longer than `timeout`.
    pub fn idle_longer_than(&self, timeout: Duration) -> bool {
        self.idle_for() > timeout
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}
