//! Wall-clock sources.

use std::sync::atomic::{AtomicI64, Ordering};

/// Unix time source for the engine.
pub trait Clock: Send + Sync {
    /// Current unix time in milliseconds
    fn now_millis(&self) -> i64;

    /// Current unix time in seconds
    fn now(&self) -> i64 {
        self.now_millis() / 1000
    }
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock, mainly for tests.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `unix_secs`
    pub fn new(unix_secs: i64) -> Self {
        Self {
            millis: AtomicI64::new(unix_secs * 1000),
        }
    }

    /// Move the clock forward
    pub fn advance_secs(&self, secs: i64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }

    pub fn set(&self, unix_secs: i64) {
        self.millis.store(unix_secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
