//! # Table Engine
//!
//! A single-table poker engine. It owns seating, blind levels, the hand
//! lifecycle and settlement of one table, and drives a pluggable hand
//! evaluator through a strict event protocol.
//!
//! ## Architecture
//!
//! Every table runs as one tokio task fed by a command channel. Callers use
//! the async verbs of [`TableEngine`]; timers and ready groups feed internal
//! commands back into the same channel, so all table mutations are
//! serialized.
//!
//! A table moves through these statuses:
//!
//! - **Created**: players may reserve and join seats
//! - **GameOpened / GamePlaying**: a hand is being dealt and played
//! - **GameSettled**: the hand result was applied to bankrolls
//! - **GameStandby**: waiting for the next hand to open
//! - **Pausing**: blind break, or not enough players with chips
//! - **Balancing**: handed back to the competition for rebalancing
//! - **Closed**: no more hands
//!
//! ## Core Modules
//!
//! - [`engine`]: Table worker, command loop and observers
//! - [`seat`]: Seat ring, dealer/blind positions and rotation
//! - [`blind`]: Blind levels, breaks and late entry
//! - [`game`]: Evaluator interface and the bundled Hold'em evaluator
//! - [`ready_group`] / [`timebank`]: Barriers and timers
//! - [`manager`]: Registry of running tables
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use table_engine::{EngineOptions, HoldemFactory, JoinPlayer, TableEngine};
//!
//! let mut engine = TableEngine::new(EngineOptions::from_env(), Arc::new(HoldemFactory::new()));
//! let table = engine.create_table(setting)?;
//! engine.player_reserve(JoinPlayer::new("alice", 1000)).await?;
//! engine.player_join("alice").await?;
//! ```

pub mod blind;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod game;
pub mod manager;
pub mod ready_group;
pub mod seat;
pub mod table;
pub mod timebank;

pub use blind::{BREAK_LEVEL, BlindLevel, BlindSchedule, BlindSetting};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineOptions, TableSetting};
pub use engine::{PlayerGameAction, TableEngine, TableStateEvent, UpdateEvent};
pub use errors::{ErrorKind, TableError, TableResult};
pub use game::{GameEngine, GameFactory, GameOptions, HoldemFactory};
pub use manager::TableManager;
pub use ready_group::ReadyGroup;
pub use seat::SeatManager;
pub use table::{
    BlindState, CompetitionMode, JoinPlayer, Rule, Table, TableMeta, TablePlayerState,
    TableStatus, UNSET_VALUE,
};
pub use timebank::TimeBank;
