//! Ready groups: barriers over indexed participants.
//!
//! A group is armed with [`ReadyGroup::start`] and completes once every
//! known participant is ready. An optional timeout runs a policy against
//! the group (normally [`ReadyGroup::ready_all`]) so one slow client never
//! blocks the table. The completion callback fires at most once per start
//! cycle and never after [`ReadyGroup::stop`].

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::time::Duration;

use crate::timebank::TimeBank;

type CompletedFn = Arc<dyn Fn() + Send + Sync>;
type TimeoutFn = Arc<dyn Fn(&ReadyGroup) + Send + Sync>;

struct ReadyGroupState {
    participants: BTreeMap<i64, bool>,
    is_running: bool,
    is_completed: bool,
    /// Bumped by every start/stop so stale timeouts can be recognised
    cycle: u64,
    timeout: Option<Duration>,
    on_timeout: Option<TimeoutFn>,
    on_completed: Option<CompletedFn>,
}

/// Barrier over a dynamic set of indexed participants
#[derive(Clone)]
pub struct ReadyGroup {
    state: Arc<Mutex<ReadyGroupState>>,
    timer: Arc<TimeBank>,
}

impl ReadyGroup {
    /// Create an idle group without timeout
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ReadyGroupState {
                participants: BTreeMap::new(),
                is_running: false,
                is_completed: false,
                cycle: 0,
                timeout: None,
                on_timeout: None,
                on_completed: None,
            })),
            timer: Arc::new(TimeBank::new()),
        }
    }

    /// Configure a timeout counted from [`ReadyGroup::start`]
    pub fn with_timeout<F>(self, secs: u64, on_timeout: F) -> Self
    where
        F: Fn(&ReadyGroup) + Send + Sync + 'static,
    {
        {
            let mut state = self.lock();
            state.timeout = Some(Duration::from_secs(secs));
            state.on_timeout = Some(Arc::new(on_timeout));
        }
        self
    }

    /// Timeout with the standard policy: stragglers are marked ready
    pub fn with_auto_ready_timeout(self, secs: u64) -> Self {
        self.with_timeout(secs, |group| group.ready_all())
    }

    /// Register the completion callback
    pub fn on_completed<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.lock().on_completed = Some(Arc::new(f));
    }

    /// Admit a participant; re-adding a known index is a no-op
    pub fn add(&self, idx: i64, is_ready: bool) {
        let callback = {
            let mut state = self.lock();
            state.participants.entry(idx).or_insert(is_ready);
            self.take_completion(&mut state)
        };
        Self::fire(callback);
    }

    /// Mark a participant ready; unknown indexes are ignored
    pub fn ready(&self, idx: i64) {
        let callback = {
            let mut state = self.lock();
            match state.participants.get_mut(&idx) {
                Some(ready) if !*ready => *ready = true,
                _ => return,
            }
            self.take_completion(&mut state)
        };
        Self::fire(callback);
    }

    /// Mark every participant ready
    pub fn ready_all(&self) {
        let callback = {
            let mut state = self.lock();
            state.participants.values_mut().for_each(|ready| *ready = true);
            self.take_completion(&mut state)
        };
        Self::fire(callback);
    }

    /// Drop all participants
    pub fn reset_participants(&self) {
        self.lock().participants.clear();
    }

    /// Arm the group and begin a fresh cycle
    pub fn start(&self) {
        let callback = {
            let mut state = self.lock();
            self.timer.cancel();
            state.cycle += 1;
            state.is_running = true;
            state.is_completed = false;

            if let (Some(timeout), Some(on_timeout)) = (state.timeout, state.on_timeout.clone()) {
                let group = self.clone();
                let cycle = state.cycle;
                self.timer.new_task(timeout, move |cancelled| {
                    if cancelled || !group.is_running_cycle(cycle) {
                        return;
                    }
                    log::debug!("Ready group cycle {} timed out", cycle);
                    on_timeout(&group);
                });
            }

            self.take_completion(&mut state)
        };
        Self::fire(callback);
    }

    /// Disarm the group without firing callbacks
    pub fn stop(&self) {
        let mut state = self.lock();
        state.cycle += 1;
        state.is_running = false;
        self.timer.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_running
    }

    /// Whether `idx` is a participant of the current set
    pub fn contains(&self, idx: i64) -> bool {
        self.lock().participants.contains_key(&idx)
    }

    /// Snapshot of participants and their readiness
    pub fn participants(&self) -> BTreeMap<i64, bool> {
        self.lock().participants.clone()
    }

    fn is_running_cycle(&self, cycle: u64) -> bool {
        let state = self.lock();
        state.is_running && state.cycle == cycle
    }

    /// Mark the cycle completed if every participant is ready and hand back the callback
    fn take_completion(&self, state: &mut ReadyGroupState) -> Option<CompletedFn> {
        if !state.is_running || state.is_completed {
            return None;
        }
        if state.participants.values().any(|ready| !ready) {
            return None;
        }

        state.is_completed = true;
        state.is_running = false;
        self.timer.cancel();
        state.on_completed.clone()
    }

    /// Callbacks run outside the lock so they may touch the group again
    fn fire(callback: Option<CompletedFn>) {
        if let Some(callback) = callback {
            callback();
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReadyGroupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ReadyGroup {
    fn default() -> Self {
        Self::new()
    }
}
