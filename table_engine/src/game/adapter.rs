//! Bridge between the table worker and a [`GameEngine`].
//!
//! Every call drains the evaluator's events and hands back what the table
//! cares about, closing with a deep copy of the new state. The copy never
//! aliases the evaluator's own state.

use super::{GameEngine, GameEvent, GameResult, GameState};
use crate::errors::{TableError, TableResult};

/// What the table sees after one evaluator call
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    AntesReceived,
    BlindsReceived,
    RoundClosed,
    /// Always the last event of a call
    StateUpdated(GameState),
}

/// Owns the evaluator of one hand
pub struct GameAdapter {
    game: Box<dyn GameEngine>,
}

impl GameAdapter {
    pub fn new(game: Box<dyn GameEngine>) -> Self {
        Self { game }
    }

    /// Deep copy of the evaluator state
    pub fn state(&self) -> GameState {
        self.game.state().clone()
    }

    pub fn start(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.start())
    }

    pub fn ready(&mut self, idx: usize) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.ready(idx))
    }

    pub fn ready_for_all(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.ready_for_all())
    }

    pub fn pay_ante(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.pay_ante())
    }

    pub fn pay(&mut self, idx: usize, chips: i64) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.pay(idx, chips))
    }

    pub fn bet(&mut self, chips: i64) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.bet(chips))
    }

    pub fn raise(&mut self, chip_level: i64) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.raise(chip_level))
    }

    pub fn call(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.call())
    }

    pub fn check(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.check())
    }

    pub fn allin(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.allin())
    }

    pub fn fold(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.fold())
    }

    pub fn pass(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.pass())
    }

    pub fn next(&mut self) -> TableResult<Vec<AdapterEvent>> {
        self.apply(|game| game.next())
    }

    fn apply<F>(&mut self, f: F) -> TableResult<Vec<AdapterEvent>>
    where
        F: FnOnce(&mut dyn GameEngine) -> GameResult<()>,
    {
        let result = f(self.game.as_mut());
        // Events raised before a failure are stale either way
        let events = self.game.drain_events();
        result?;

        let mut out = Vec::with_capacity(events.len() + 1);
        for event in events {
            match event {
                GameEvent::AntesReceived => out.push(AdapterEvent::AntesReceived),
                GameEvent::BlindsReceived => out.push(AdapterEvent::BlindsReceived),
                GameEvent::RoundClosed => out.push(AdapterEvent::RoundClosed),
                GameEvent::Unknown => {
                    return Err(TableError::GameUnknownEvent(event.name().to_string()));
                }
                _ => {}
            }
        }
        out.push(AdapterEvent::StateUpdated(self.state()));
        Ok(out)
    }
}
