//! Hand evaluator interface and the bundled reference evaluator.
//!
//! The table engine drives a hand only through [`GameEngine`]; any rules
//! engine implementing it (and a [`GameFactory`] producing it) can be
//! plugged in. [`HoldemGame`] covers Texas Hold'em, short-deck and Omaha.

pub mod adapter;
pub mod cards;
pub mod evaluator;
pub mod holdem;
pub mod pot;
pub mod state;

pub use adapter::{AdapterEvent, GameAdapter};
pub use cards::{Card, DeckKind, Suit};
pub use holdem::{HoldemFactory, HoldemGame};
pub use state::{
    ActionKind, GameEvent, GameMeta, GamePlayerState, GameRound, GameState, GameStatus,
    HandResult, PlayerResult, PotResult, Position,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a hand evaluator
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("game already started")]
    AlreadyStarted,

    #[error("not current player")]
    NotCurrentPlayer,

    #[error("unknown player {0}")]
    UnknownPlayer(usize),

    #[error("action not allowed during {0}")]
    InvalidEvent(&'static str),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid wager {0}")]
    InvalidWager(i64),

    #[error("insufficient bankroll")]
    InsufficientBankroll,

    #[error("invalid card {0}")]
    InvalidCard(String),

    #[error("invalid game options: {0}")]
    InvalidOptions(String),
}

/// Result type for evaluator operations
pub type GameResult<T> = Result<T, GameError>;

/// Blind amounts of a hand
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindOptions {
    /// Extra dead chips posted by the dealer
    pub dealer: i64,
    pub sb: i64,
    pub bb: i64,
}

/// Seat of one participant, in hand order (dealer first)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSetting {
    pub bankroll: i64,
    pub positions: Vec<Position>,
}

/// Everything needed to deal one hand
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    pub deck: DeckKind,
    pub hole_cards_count: usize,
    /// Hole cards that must be used at showdown, 0 for any
    pub required_hole_cards_count: usize,
    pub ante: i64,
    pub blind: BlindOptions,
    pub players: Vec<PlayerSetting>,
}

impl GameOptions {
    /// Validate options
    pub fn validate(&self) -> Result<(), String> {
        if self.players.len() < 2 {
            return Err("At least two players are required".to_string());
        }

        if self.hole_cards_count == 0 || self.required_hole_cards_count > self.hole_cards_count {
            return Err("Invalid hole card counts".to_string());
        }

        let needed = self.players.len() * self.hole_cards_count + 5;
        if needed > self.deck.cards().len() {
            return Err(format!("Deck too small for {} players", self.players.len()));
        }

        if self.ante < 0 || self.blind.dealer < 0 || self.blind.sb < 0 || self.blind.bb < 0 {
            return Err("Blinds must not be negative".to_string());
        }

        if self.players.iter().any(|p| p.bankroll <= 0) {
            return Err("Every player needs a positive bankroll".to_string());
        }

        Ok(())
    }
}

/// One hand of poker
///
/// Betting actions always apply to the current player; callers check
/// `state().status.current_player` first. Every state change is announced
/// through [`GameEngine::drain_events`].
pub trait GameEngine: Send {
    /// Deal and request readiness
    fn start(&mut self) -> GameResult<()>;

    /// Record a player's acknowledgement
    fn ready(&mut self, idx: usize) -> GameResult<()>;

    /// Acknowledge for everybody and move on
    fn ready_for_all(&mut self) -> GameResult<()>;

    /// Collect antes from everybody who has not paid yet
    fn pay_ante(&mut self) -> GameResult<()>;

    /// Individual payment (ante, or blind confirmation)
    fn pay(&mut self, idx: usize, chips: i64) -> GameResult<()>;

    fn bet(&mut self, chips: i64) -> GameResult<()>;

    /// Raise the round's wager to `chip_level`
    fn raise(&mut self, chip_level: i64) -> GameResult<()>;

    fn call(&mut self) -> GameResult<()>;

    fn check(&mut self) -> GameResult<()>;

    fn allin(&mut self) -> GameResult<()>;

    fn fold(&mut self) -> GameResult<()>;

    /// Check when possible, otherwise fold
    fn pass(&mut self) -> GameResult<()>;

    /// Advance a closed round: deal the next street or settle
    fn next(&mut self) -> GameResult<()>;

    fn state(&self) -> &GameState;

    fn drain_events(&mut self) -> Vec<GameEvent>;
}

/// Creates one [`GameEngine`] per hand
pub trait GameFactory: Send + Sync {
    fn create(&self, options: GameOptions) -> GameResult<Box<dyn GameEngine>>;
}
