//! Table data model.
//!
//! A [`Table`] is one JSON document with stable snake_case field names; the
//! evaluator's [`GameState`] is embedded verbatim while a hand runs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::game::{GameState, Position};

/// Marker for an unset seat, dealer position or start time
pub const UNSET_VALUE: i32 = -1;

/// Rule variant of the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Texas Hold'em
    Default,
    ShortDeck,
    Omaha,
}

/// Competition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionMode {
    /// Time-capped tournament
    Ct,
    /// Multi-table tournament
    Mtt,
    Cash,
}

/// Table status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Created,
    GameStandby,
    GameOpened,
    GamePlaying,
    GameSettled,
    Pausing,
    Balancing,
    Closed,
    Restoring,
}

/// Immutable table settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub competition_id: String,
    pub rule: Rule,
    pub mode: CompetitionMode,
    pub max_duration_secs: i64,
    pub max_seats: usize,
    /// Minimum participants needed to run a hand
    pub min_players: usize,
    pub min_chip_unit: i64,
    pub action_time_secs: i64,
}

/// Blind level snapshot, `level == -1` while breaking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindState {
    pub level: i32,
    pub ante: i64,
    pub dealer: i64,
    pub sb: i64,
    pub bb: i64,
}

/// Per-hand statistics of a player
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayerGameStatistics {
    /// Reached showdown (did not fold while more than one player remained)
    pub showdown_winning_chance: bool,
    pub is_showdown_winning: bool,
}

/// A player record on the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayerState {
    pub player_id: String,
    pub seat: i32,
    pub positions: Vec<Position>,
    pub is_participated: bool,
    pub is_between_dealer_bb: bool,
    pub bankroll: i64,
    /// Seated and joined; reserved players are not in yet
    pub is_in: bool,
    pub game_statistics: TablePlayerGameStatistics,
}

impl TablePlayerState {
    /// Create a reserved player record
    pub fn new(player_id: impl Into<String>, seat: i32, bankroll: i64) -> Self {
        Self {
            player_id: player_id.into(),
            seat,
            positions: vec![],
            is_participated: false,
            is_between_dealer_bb: false,
            bankroll,
            is_in: false,
            game_statistics: TablePlayerGameStatistics::default(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.is_in && self.bankroll > 0
    }
}

/// Mutable table state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub status: TableStatus,
    /// Unix seconds of the first hand, `-1` until started
    pub start_at: i64,
    /// Seat -> index into `player_states`, `-1` when empty
    pub seat_map: Vec<i32>,
    pub blind_state: BlindState,
    /// Blinds frozen for the running hand
    pub game_blind_state: BlindState,
    pub current_dealer_seat: i32,
    pub current_sb_seat: i32,
    pub current_bb_seat: i32,
    pub player_states: Vec<TablePlayerState>,
    pub game_count: i64,
    /// Participants of the running hand, dealer first
    pub game_player_indexes: Vec<usize>,
    pub game_state: Option<GameState>,
    /// Deadline of the current actor (unix seconds), 0 when none
    pub current_action_end_at: i64,
    pub next_bb_order_player_ids: Vec<String>,
}

impl TableState {
    pub fn new(max_seats: usize) -> Self {
        Self {
            status: TableStatus::Created,
            start_at: UNSET_VALUE as i64,
            seat_map: vec![UNSET_VALUE; max_seats],
            blind_state: BlindState::default(),
            game_blind_state: BlindState::default(),
            current_dealer_seat: UNSET_VALUE,
            current_sb_seat: UNSET_VALUE,
            current_bb_seat: UNSET_VALUE,
            player_states: vec![],
            game_count: 0,
            game_player_indexes: vec![],
            game_state: None,
            current_action_end_at: 0,
            next_bb_order_player_ids: vec![],
        }
    }
}

/// A poker table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    pub meta: TableMeta,
    pub state: TableState,
    /// Unix millis of the last update
    pub update_at: i64,
    pub update_serial: i64,
}

impl Table {
    /// Create a new table in `created` status
    pub fn new(id: impl Into<String>, meta: TableMeta) -> Self {
        let state = TableState::new(meta.max_seats);
        Self {
            id: id.into(),
            meta,
            state,
            update_at: 0,
            update_serial: 0,
        }
    }

    /// Index of `player_id` in `player_states`
    pub fn find_player_idx(&self, player_id: &str) -> Option<usize> {
        self.state
            .player_states
            .iter()
            .position(|p| p.player_id == player_id)
    }

    /// Index of `player_id` among the running hand's participants
    pub fn game_player_index(&self, player_id: &str) -> Option<usize> {
        let player_idx = self.find_player_idx(player_id)?;
        self.state
            .game_player_indexes
            .iter()
            .position(|idx| *idx == player_idx)
    }

    /// Players that are in and still hold chips
    pub fn alive_player_count(&self) -> usize {
        self.state
            .player_states
            .iter()
            .filter(|p| p.is_alive())
            .count()
    }

    pub fn is_playing(&self) -> bool {
        self.state.status == TableStatus::GamePlaying
    }

    /// Whether `player_id` takes part in the running hand
    pub fn is_in_running_hand(&self, player_id: &str) -> bool {
        matches!(
            self.state.status,
            TableStatus::GameOpened | TableStatus::GamePlaying
        ) && self.game_player_index(player_id).is_some()
    }

    /// Remove players and rebuild every index that points into `player_states`
    pub fn remove_players(&mut self, player_ids: &[String]) {
        let removed: HashSet<&str> = player_ids.iter().map(String::as_str).collect();
        let old_players = std::mem::take(&mut self.state.player_states);

        let mut remap = vec![None; old_players.len()];
        for (old_idx, player) in old_players.into_iter().enumerate() {
            if removed.contains(player.player_id.as_str()) {
                continue;
            }
            remap[old_idx] = Some(self.state.player_states.len());
            self.state.player_states.push(player);
        }

        self.state.game_player_indexes = self
            .state
            .game_player_indexes
            .iter()
            .filter_map(|idx| remap.get(*idx).copied().flatten())
            .collect();
        self.state
            .next_bb_order_player_ids
            .retain(|id| !removed.contains(id.as_str()));
        self.rebuild_seat_map();
    }

    /// Rebuild `seat_map` from the players' seats
    pub fn rebuild_seat_map(&mut self) {
        self.state.seat_map = vec![UNSET_VALUE; self.meta.max_seats];
        for (idx, player) in self.state.player_states.iter().enumerate() {
            if player.seat >= 0
                && let Some(slot) = self.state.seat_map.get_mut(player.seat as usize)
            {
                *slot = idx as i32;
            }
        }
    }
}

/// Player joining (or buying more chips on) a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlayer {
    pub player_id: String,
    pub redeem_chips: i64,
    /// Requested seat; random when absent
    #[serde(default)]
    pub seat: Option<usize>,
}

impl JoinPlayer {
    pub fn new(player_id: impl Into<String>, redeem_chips: i64) -> Self {
        Self {
            player_id: player_id.into(),
            redeem_chips,
            seat: None,
        }
    }

    pub fn with_seat(mut self, seat: usize) -> Self {
        self.seat = Some(seat);
        self
    }
}
