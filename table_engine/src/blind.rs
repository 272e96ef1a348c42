//! Blind schedule: levels, breaks and late-entry close.

use serde::{Deserialize, Serialize};

use crate::table::BlindState;

/// Level number marking a break
pub const BREAK_LEVEL: i32 = -1;

/// A single blind level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindLevel {
    /// Level number (1-indexed), `-1` for a break
    pub level: i32,
    pub sb: i64,
    pub bb: i64,
    #[serde(default)]
    pub ante: i64,
    /// Dealer ante multiplier; the dealer pays `ante * (dealer_times - 1)` extra
    #[serde(default)]
    pub dealer_times: i64,
    pub duration_secs: i64,
}

impl BlindLevel {
    /// Create a new blind level
    pub fn new(level: i32, sb: i64, bb: i64, duration_secs: i64) -> Self {
        Self {
            level,
            sb,
            bb,
            ante: 0,
            dealer_times: 0,
            duration_secs,
        }
    }

    /// Create a break of `duration_secs`
    pub fn break_level(duration_secs: i64) -> Self {
        Self::new(BREAK_LEVEL, 0, 0, duration_secs)
    }

    /// Create a blind level with ante
    pub fn with_ante(mut self, ante: i64) -> Self {
        self.ante = ante;
        self
    }

    pub fn with_dealer_times(mut self, dealer_times: i64) -> Self {
        self.dealer_times = dealer_times;
        self
    }

    pub fn is_break(&self) -> bool {
        self.level == BREAK_LEVEL
    }

    /// Snapshot handed to the table
    pub fn state(&self) -> BlindState {
        let dealer = if self.dealer_times > 1 {
            self.ante * (self.dealer_times - 1)
        } else {
            0
        };

        BlindState {
            level: self.level,
            ante: self.ante,
            dealer,
            sb: self.sb,
            bb: self.bb,
        }
    }
}

/// Blind structure of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSetting {
    pub levels: Vec<BlindLevel>,

    /// First level played once the table starts
    pub initial_level: i32,

    /// Last level in which players may still buy in; 0 disables late entry
    pub final_buy_in_level: i32,
}

impl BlindSetting {
    /// Validate setting
    pub fn validate(&self) -> Result<(), String> {
        if self.levels.is_empty() {
            return Err("Blind levels must not be empty".to_string());
        }

        for level in &self.levels {
            if level.duration_secs <= 0 {
                return Err(format!("Blind level {} duration must be positive", level.level));
            }
            if level.is_break() {
                continue;
            }
            if level.level <= 0 {
                return Err(format!("Invalid blind level number {}", level.level));
            }
            if level.sb < 0 || level.bb <= 0 || level.sb > level.bb || level.ante < 0 {
                return Err(format!("Invalid blinds for level {}", level.level));
            }
        }

        if self.position_of(self.initial_level).is_none() {
            return Err(format!("Initial level {} not found", self.initial_level));
        }

        if self.final_buy_in_level != 0 && self.position_of(self.final_buy_in_level).is_none() {
            return Err(format!(
                "Final buy-in level {} not found",
                self.final_buy_in_level
            ));
        }

        Ok(())
    }

    fn position_of(&self, level: i32) -> Option<usize> {
        if level == BREAK_LEVEL {
            return None;
        }
        self.levels.iter().position(|l| l.level == level)
    }
}

#[derive(Debug, Clone)]
struct ScheduledLevel {
    level: BlindLevel,
    /// Absolute end time (unix seconds), `-1` until activated
    end_at: i64,
}

/// Blind levels tracked against wall-clock time
#[derive(Debug, Clone)]
pub struct BlindSchedule {
    levels: Vec<ScheduledLevel>,
    initial_idx: usize,
    final_buy_in_idx: Option<usize>,
    is_activated: bool,
}

impl BlindSchedule {
    /// Create an inactive schedule from a validated setting
    pub fn new(setting: &BlindSetting) -> Self {
        Self {
            levels: setting
                .levels
                .iter()
                .cloned()
                .map(|level| ScheduledLevel { level, end_at: -1 })
                .collect(),
            initial_idx: setting.position_of(setting.initial_level).unwrap_or(0),
            final_buy_in_idx: setting.position_of(setting.final_buy_in_level),
            is_activated: false,
        }
    }

    /// Compute every level's end time starting at `start_at`
    ///
    /// Levels before the initial level are considered ended at `start_at`.
    pub fn activate(&mut self, start_at: i64) {
        let mut end_at = start_at;
        for (idx, scheduled) in self.levels.iter_mut().enumerate() {
            if idx >= self.initial_idx {
                end_at += scheduled.level.duration_secs;
            }
            scheduled.end_at = end_at;
        }
        self.is_activated = true;
    }

    pub fn is_activated(&self) -> bool {
        self.is_activated
    }

    /// Index of the level in effect at `now`; the last level never ends
    fn current_idx(&self, now: i64) -> usize {
        if !self.is_activated {
            return self.initial_idx;
        }
        self.levels
            .iter()
            .enumerate()
            .skip(self.initial_idx)
            .find(|(_, scheduled)| now < scheduled.end_at)
            .map(|(idx, _)| idx)
            .unwrap_or(self.levels.len().saturating_sub(1))
    }

    /// Blind state in effect at `now`
    pub fn current(&self, now: i64) -> BlindState {
        self.levels
            .get(self.current_idx(now))
            .map(|scheduled| scheduled.level.state())
            .unwrap_or_default()
    }

    /// Whether `now` falls inside a break level
    pub fn is_breaking(&self, now: i64) -> bool {
        self.current(now).level == BREAK_LEVEL
    }

    /// End time of the level in effect at `now`, `-1` before activation
    pub fn current_level_end_at(&self, now: i64) -> i64 {
        self.levels
            .get(self.current_idx(now))
            .map(|scheduled| scheduled.end_at)
            .unwrap_or(-1)
    }

    /// Whether the final buy-in level has ended at `now`
    ///
    /// Without a final buy-in level late entry closes as soon as the
    /// schedule starts.
    pub fn is_late_entry_closed(&self, now: i64) -> bool {
        if !self.is_activated {
            return false;
        }
        match self.final_buy_in_idx.and_then(|idx| self.levels.get(idx)) {
            Some(scheduled) => now >= scheduled.end_at,
            None => true,
        }
    }
}
