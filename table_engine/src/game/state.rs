//! Evaluator state document.
//!
//! This is the JSON shape embedded verbatim in a table's `game_state`.

use serde::{Deserialize, Serialize};

use super::{BlindOptions, cards::Card, cards::DeckKind};

/// Position labels at the table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Dealer,
    Sb,
    Bb,
    Ug,
    Ug1,
    Ug2,
    Ug3,
    Hj,
    Co,
}

/// Lifecycle events of a hand, in order of appearance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameEvent {
    #[default]
    ReadyRequested,
    Prepared,
    AntesReceived,
    BlindsReceived,
    RoundInitialized,
    RoundPrepared,
    RoundClosed,
    GameClosed,
    #[serde(other)]
    Unknown,
}

impl GameEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadyRequested => "ready_requested",
            Self::Prepared => "prepared",
            Self::AntesReceived => "antes_received",
            Self::BlindsReceived => "blinds_received",
            Self::RoundInitialized => "round_initialized",
            Self::RoundPrepared => "round_prepared",
            Self::RoundClosed => "round_closed",
            Self::GameClosed => "game_closed",
            Self::Unknown => "unknown",
        }
    }
}

/// Betting round
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameRound {
    #[default]
    Preflop,
    Flop,
    Turn,
    River,
}

impl GameRound {
    pub fn name(self) -> &'static str {
        match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Preflop => Some(Self::Flop),
            Self::Flop => Some(Self::Turn),
            Self::Turn => Some(Self::River),
            Self::River => None,
        }
    }
}

/// Player actions, as recorded by the evaluator and reported to observers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Ready,
    Pay,
    Bet,
    Raise,
    Call,
    Check,
    Allin,
    Fold,
    Pass,
}

/// Hand configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMeta {
    pub deck: DeckKind,
    pub hole_cards_count: usize,
    pub required_hole_cards_count: usize,
    pub ante: i64,
    pub blind: BlindOptions,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    pub current_event: GameEvent,
    pub current_round: GameRound,
    /// Index of the player to act
    pub current_player: usize,
    /// Highest wager of the round
    pub current_wager: i64,
    pub current_raiser: Option<usize>,
    pub min_raise: i64,
    pub board: Vec<Card>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayerState {
    pub idx: usize,
    pub positions: Vec<Position>,
    pub bankroll: i64,
    pub initial_bankroll: i64,
    /// Chips bet in the current round
    pub wager: i64,
    /// Chips collected from earlier rounds and antes
    pub pot: i64,
    pub fold: bool,
    pub acted: bool,
    pub did_action: Option<ActionKind>,
    pub hole_cards: Vec<Card>,
    pub combination_power: i64,
    pub is_ready: bool,
}

impl GamePlayerState {
    pub fn has_position(&self, position: Position) -> bool {
        self.positions.contains(&position)
    }

    /// Total chips put in during this hand
    pub fn contribution(&self) -> i64 {
        self.pot + self.wager
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub idx: usize,
    #[serde(rename = "final")]
    pub final_bankroll: i64,
    pub changed: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotResult {
    pub total: i64,
    pub winners: Vec<usize>,
}

/// Settlement of a closed hand
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandResult {
    pub players: Vec<PlayerResult>,
    pub pots: Vec<PotResult>,
}

/// Full evaluator state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub meta: GameMeta,
    pub status: GameStatus,
    pub players: Vec<GamePlayerState>,
    #[serde(default)]
    pub result: Option<HandResult>,
}

impl GameState {
    pub fn player(&self, idx: usize) -> Option<&GamePlayerState> {
        self.players.get(idx)
    }

    /// Players still holding cards
    pub fn not_folded_count(&self) -> usize {
        self.players.iter().filter(|p| !p.fold).count()
    }

    pub fn current_event(&self) -> GameEvent {
        self.status.current_event
    }
}
