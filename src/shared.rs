use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Mutex, PoisonError,
};

/// Holds the latest value of `T`.
///
/// Writers replace the whole value and readers copy the whole value, so a
/// reader never observes a half-written record. The lock is held only for
/// the duration of a copy.
pub struct Latest<T: Copy> {
    slot: Mutex<T>,
    fresh: AtomicBool,
    generation: AtomicU32,
}

impl<T: Copy> Latest<T> {
    pub const fn new(init: T) -> Self {
        Latest {
            slot: Mutex::new(init),
            fresh: AtomicBool::new(false),
            generation: AtomicU32::new(0),
        }
    }

    /// Replaces the value and raises the freshness flag.
    pub fn publish(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
        self.generation.fetch_add(1, Ordering::Release);
        self.fresh.store(true, Ordering::Release);
    }

    /// Copy of the current value.
    pub fn snapshot(&self) -> T {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The current value if it was published since the last call.
    pub fn take_fresh(&self) -> Option<T> {
        if self.fresh.swap(false, Ordering::AcqRel) {
            Some(self.snapshot())
        } else {
            None
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::Acquire)
    }

    /// Number of publications so far, wrapping.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }
}

impl<T: Copy + Default> Default for Latest<T> {
    fn default() -> Self {
        Latest::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;
    use crate::telemetry::TelemetryRecord;

    #[test]
    fn snapshot_starts_with_initial_value() {
        let cell = Latest::new(42);
        assert_eq!(cell.snapshot(), 42);
        assert!(!cell.is_fresh());
        assert_eq!(cell.take_fresh(), None);
    }

    #[test]
    fn publish_sets_and_take_clears_the_flag() {
        let cell = Latest::new(0u32);
        cell.publish(7);
        assert!(cell.is_fresh());
        assert_eq!(cell.take_fresh(), Some(7));
        assert_eq!(cell.take_fresh(), None);
        assert_eq!(cell.snapshot(), 7);
        assert_eq!(cell.generation(), 1);
    }

    #[test]
    fn readers_never_see_torn_records() {
        let cell = Arc::new(Latest::<TelemetryRecord>::default());

        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 0..2_000u32 {
                    let mut record = TelemetryRecord::default();
                    record.timestamp = i as f32;
                    record.motion.pitch = i as f32;
                    record.position.second = i as i32;
                    cell.publish(record);
                }
            })
        };

        for _ in 0..2_000 {
            let record = cell.snapshot();
            assert_eq!(record.timestamp, record.motion.pitch);
            assert_eq!(record.timestamp as i32, record.position.second);
        }

        writer.join().unwrap();
        assert_eq!(cell.generation(), 2_000);
    }
}
