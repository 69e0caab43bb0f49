use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

/// Monotonic device time in milliseconds. Wraps after ~49.7 days, so
/// consumers must compare instants with `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Milliseconds since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // truncation is the wraparound
        self.start.elapsed().as_millis() as u32
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        ManualClock {
            now: Arc::new(AtomicU32::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u32) {
        self.now.store(now_ms, Ordering::Relaxed);
    }

    pub fn advance(&self, delta_ms: u32) {
        let now = self.now.load(Ordering::Relaxed);
        self.now.store(now.wrapping_add(delta_ms), Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(10);
        let other = clock.clone();
        clock.advance(90);
        assert_eq!(other.now_ms(), 100);
    }

    #[test]
    fn manual_clock_wraps() {
        let clock = ManualClock::new(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.now_ms(), 1);
    }
}
