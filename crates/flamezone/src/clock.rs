//! Microsecond clocks and thread/process identity.
//!
//! Every timestamp in a trace comes from a [`Clock`]. Platform differences
//! are hidden behind the trait: [`MonotonicClock`] rides on `Instant`, which
//! maps to the performance counter on Windows and `CLOCK_MONOTONIC` on Unix,
//! and all values are normalized to integer microseconds before storage.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of microsecond timestamps.
///
/// Values only need to be consistent within one process; the writer rebases
/// them on the earliest recorded start.
pub trait Clock: Send + Sync {
    /// Current time in microseconds since the clock's epoch.
    fn now_micros(&self) -> u64;
}

/// Monotonic clock anchored at the first time any `MonotonicClock` is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    fn anchor() -> Instant {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        *ANCHOR.get_or_init(Instant::now)
    }
}

impl Clock for MonotonicClock {
    fn now_micros(&self) -> u64 {
        Self::anchor().elapsed().as_micros() as u64
    }
}

/// Wall clock in microseconds since the UNIX epoch.
///
/// Not monotonic: a system time adjustment between zone open and close can
/// produce a zero duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to. Intended for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start` microseconds.
    pub fn new(start: u64) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Set the current reading.
    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::SeqCst);
    }

    /// Move the clock forward by `micros`.
    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

thread_local! {
    static THREAD_ID: u32 = hash_thread_id();
}

fn hash_thread_id() -> u32 {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    let hash = hasher.finish();
    // Fold the high half in so the truncation keeps all of the hash's entropy.
    (hash ^ (hash >> 32)) as u32
}

/// Hashed id of the calling thread, stable for the thread's lifetime.
pub fn current_thread_id() -> u32 {
    THREAD_ID.with(|id| *id)
}

/// Id of the current process.
pub fn current_process_id() -> u32 {
    std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock;
        let mut last = clock.now_micros();
        for _ in 0..1000 {
            let now = clock.now_micros();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_monotonic_clock_measures_sleep() {
        let clock = MonotonicClock;
        let start = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.now_micros() - start >= 2_000);
    }

    #[test]
    fn test_wall_clock_is_after_epoch() {
        // 2020-01-01T00:00:00Z in microseconds.
        assert!(WallClock.now_micros() > 1_577_836_800_000_000);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_micros(), 10);
        clock.advance(5);
        assert_eq!(clock.now_micros(), 15);
        clock.set(100);
        assert_eq!(clock.now_micros(), 100);
    }

    #[test]
    fn test_thread_id_is_stable_per_thread() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());

        let other = std::thread::spawn(|| (current_thread_id(), current_thread_id()))
            .join()
            .unwrap();
        assert_eq!(other.0, other.1);
        assert_ne!(here, other.0);
    }

    #[test]
    fn test_process_id_matches_std() {
        assert_eq!(current_process_id(), std::process::id());
    }
}
