use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Last-read and last-sent timestamps, stored as milliseconds since an anchor
/// so they can live in atomics.
#[derive(Debug)]
pub struct LivenessClock {
    anchor: Instant,
    last_read_ms: AtomicU64,
    last_sent_ms: AtomicU64,
}

impl Default for LivenessClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            last_read_ms: AtomicU64::new(0),
            last_sent_ms: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        self.anchor.elapsed().as_millis() as u64
    }

    /// Never moves the read timestamp backwards.
    pub fn mark_read(&self) {
        self.last_read_ms.fetch_max(self.now_ms(), Ordering::AcqRel);
    }

    pub fn mark_sent(&self) {
        self.last_sent_ms.fetch_max(self.now_ms(), Ordering::AcqRel);
    }

    pub fn since_read(&self) -> Duration {
        let last = self.last_read_ms.load(Ordering::Acquire);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }

    pub fn since_sent(&self) -> Duration {
        let last = self.last_sent_ms.load(Ordering::Acquire);
        Duration::from_millis(self.now_ms().saturating_sub(last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn read_age_grows_until_marked() {
        let clock = LivenessClock::new();
        tokio::time::advance(Duration::from_millis(1200)).await;
        assert_eq!(clock.since_read(), Duration::from_millis(1200));
        clock.mark_read();
        assert_eq!(clock.since_read(), Duration::ZERO);
        tokio::time::advance(Duration::from_millis(300)).await;
        assert_eq!(clock.since_read(), Duration::from_millis(300));
        assert_eq!(clock.since_sent(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn sent_and_read_are_independent() {
        let clock = LivenessClock::new();
        tokio::time::advance(Duration::from_millis(50)).await;
        clock.mark_sent();
        assert_eq!(clock.since_sent(), Duration::ZERO);
        assert_eq!(clock.since_read(), Duration::from_millis(50));
    }
}
