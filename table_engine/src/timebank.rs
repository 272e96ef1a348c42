//! Single-shot timers with whole-bank cancellation.
//!
//! Every task runs on its own tokio task and calls its callback exactly
//! once: with `false` when the timer elapsed, with `true` when the bank was
//! cancelled (or dropped) first. Callbacks must not touch table state
//! directly; they re-enter the engine through its command channel.

use std::sync::Arc;
use tokio::{
    sync::watch,
    time::{Duration, sleep},
};

use crate::clock::{Clock, SystemClock};

/// Bank of cancellable single-shot timers
pub struct TimeBank {
    epoch: watch::Sender<u64>,
    clock: Arc<dyn Clock>,
}

impl TimeBank {
    /// Create a time bank using the system clock for deadlines
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a time bank resolving deadlines against `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (epoch, _) = watch::channel(0);
        Self { epoch, clock }
    }

    /// Schedule `f(false)` after `duration`
    pub fn new_task<F>(&self, duration: Duration, f: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let mut cancelled = self.epoch.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(duration) => f(false),
                _ = cancelled.changed() => f(true),
            }
        });
    }

    /// Schedule `f(false)` at the unix time `deadline` (seconds)
    ///
    /// Deadlines in the past fire immediately.
    pub fn new_task_with_deadline<F>(&self, deadline: i64, f: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let remaining_millis = (deadline * 1000 - self.clock.now_millis()).max(0);
        self.new_task(Duration::from_millis(remaining_millis as u64), f);
    }

    /// Abort every in-flight task; each one is called with `cancelled = true`
    pub fn cancel(&self) {
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    pub fn reset(&self) {
        self.cancel();
    }
}

impl Default for TimeBank {
    fn default() -> Self {
        Self::new()
    }
}
