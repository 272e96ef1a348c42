//! Observer callbacks and the events they receive.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    errors::TableError,
    game::ActionKind,
    table::{Table, TablePlayerState, TableStatus},
};

/// Named table update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// Command or evaluator event that caused the update, e.g. `PlayerJoin`
    pub name: String,
    /// Players the update is about, empty for table-wide updates
    pub player_ids: Vec<String>,
}

/// Coarse table state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStateEvent {
    StatusUpdated(TableStatus),
    GameUpdated,
    GameSettled,
}

/// One player action inside a hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGameAction {
    pub table_id: String,
    pub game_id: String,
    pub game_count: i64,
    /// Betting round, or `ante`
    pub round: String,
    pub player_id: String,
    pub action: ActionKind,
    /// Chips moved from the player's bankroll by this action
    pub chips: i64,
    pub seat: i32,
    pub update_at: i64,
}

pub type TableUpdatedFn = Arc<dyn Fn(&Table, &UpdateEvent) + Send + Sync>;
pub type ErrorUpdatedFn = Arc<dyn Fn(&Table, &TableError) + Send + Sync>;
pub type TableStateUpdatedFn = Arc<dyn Fn(TableStateEvent, &Table) + Send + Sync>;
/// `(competition_id, table_id, player)`
pub type TablePlayerStateFn = Arc<dyn Fn(&str, &str, &TablePlayerState) + Send + Sync>;
pub type GamePlayerActionFn = Arc<dyn Fn(&PlayerGameAction) + Send + Sync>;
pub type ReadyOpenFirstGameFn = Arc<dyn Fn(&Table) + Send + Sync>;
/// `(competition_id, table_id)`
pub type AutoGameOpenEndFn = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Registered observers; all of them run on the table worker
#[derive(Clone, Default)]
pub(crate) struct Observers {
    pub table_updated: Option<TableUpdatedFn>,
    pub error_updated: Option<ErrorUpdatedFn>,
    pub table_state_updated: Option<TableStateUpdatedFn>,
    pub table_player_state_updated: Option<TablePlayerStateFn>,
    pub table_player_reserved: Option<TablePlayerStateFn>,
    pub game_player_action_updated: Option<GamePlayerActionFn>,
    pub ready_open_first_table_game: Option<ReadyOpenFirstGameFn>,
    pub auto_game_open_end: Option<AutoGameOpenEndFn>,
}
