use crate::config::RateConfig;

/// A minimum interval gating a periodic action. Checking it never blocks.
#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    interval_ms: u32,
    last_ms: u32,
}

impl Cadence {
    pub fn new(interval_ms: u32, start_ms: u32) -> Self {
        Cadence {
            interval_ms,
            last_ms: start_ms,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Elapsed time since the last firing, correct across counter wrap.
    pub fn elapsed(&self, now_ms: u32) -> u32 {
        now_ms.wrapping_sub(self.last_ms)
    }

    /// Returns `true` and rearms if the interval has elapsed.
    pub fn ready(&mut self, now_ms: u32) -> bool {
        if self.elapsed(now_ms) < self.interval_ms {
            return false;
        }

        self.last_ms = now_ms;
        true
    }
}

/// What a loop iteration should do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ticks {
    pub sample: bool,
    pub transmit: bool,
}

/// Sampling and transmission cadences sharing one loop.
#[derive(Debug, Clone)]
pub struct RateScheduler {
    sample: Cadence,
    transmit: Cadence,
}

impl RateScheduler {
    pub fn new(rates: RateConfig, start_ms: u32) -> Self {
        RateScheduler {
            sample: Cadence::new(rates.sample_interval_ms, start_ms),
            transmit: Cadence::new(rates.transmit_interval_ms, start_ms),
        }
    }

    /// Both cadences are checked on every call; sampling is reported first
    /// so callers can assemble before they send.
    pub fn poll(&mut self, now_ms: u32) -> Ticks {
        Ticks {
            sample: self.sample.ready(now_ms),
            transmit: self.transmit.ready(now_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_fires_only_after_interval() {
        let mut cadence = Cadence::new(100, 0);
        assert!(!cadence.ready(0));
        assert!(!cadence.ready(99));
        assert!(cadence.ready(100));
        assert!(!cadence.ready(150));
        assert!(cadence.ready(230));
        assert!(!cadence.ready(329));
        assert!(cadence.ready(330));
    }

    #[test]
    fn cadence_handles_wraparound() {
        let mut cadence = Cadence::new(100, u32::MAX - 20);
        assert!(!cadence.ready(u32::MAX));
        assert!(!cadence.ready(78));
        assert!(cadence.ready(79));
        assert_eq!(cadence.elapsed(80), 1);
    }

    #[test]
    fn fast_polling_produces_no_duplicates() {
        let mut scheduler = RateScheduler::new(RateConfig::default(), 0);
        let mut samples = 0;
        let mut transmissions = 0;

        // poll every millisecond for two seconds
        for now in 0..=2000u32 {
            let ticks = scheduler.poll(now);
            if ticks.sample {
                samples += 1;
                assert_eq!(now % 100, 0);
            }
            if ticks.transmit {
                transmissions += 1;
                assert_eq!(now % 500, 0);
            }
        }

        assert_eq!(samples, 20);
        assert_eq!(transmissions, 4);
    }

    #[test]
    fn coarse_polling_fires_at_most_once_per_call() {
        let mut scheduler = RateScheduler::new(RateConfig::default(), 0);
        let ticks = scheduler.poll(1_700);
        assert_eq!(
            ticks,
            Ticks {
                sample: true,
                transmit: true
            }
        );
        assert_eq!(scheduler.poll(1_750), Ticks::default());
        assert!(scheduler.poll(1_800).sample);
    }
}
