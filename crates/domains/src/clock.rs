//! Time source shared by the stores and the in-memory registries.

use chrono::{DateTime, Utc};

/// Wall-clock abstraction so expiry logic can be driven by tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "testing"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "testing"))]
mod manual {
    use std::sync::atomic::{AtomicI64, Ordering};

    use chrono::{DateTime, TimeDelta, Utc};

    use super::Clock;

    /// A clock that only moves when told to. Microsecond resolution.
    #[derive(Debug)]
    pub struct ManualClock {
        micros: AtomicI64,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self { micros: AtomicI64::new(start.timestamp_micros()) }
        }

        /// Starts at 2024-01-01T00:00:00Z.
        pub fn at_epoch() -> Self {
            Self::new(DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default())
        }

        pub fn advance(&self, by: TimeDelta) {
            self.micros.fetch_add(by.num_microseconds().unwrap_or(i64::MAX), Ordering::SeqCst);
        }

        pub fn set(&self, to: DateTime<Utc>) {
            self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }
}
