//! Reference evaluator: Texas Hold'em, short-deck and Omaha.
//!
//! A hand walks through `ready_requested → [prepared → antes_received] →
//! blinds_received → round_initialized → round_prepared → round_closed`
//! once per street and ends with `game_closed`. Blinds are posted as soon
//! as antes are in; the dealer blind is dead money.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};
use uuid::Uuid;

use super::{
    GameEngine, GameError, GameFactory, GameOptions, GameResult,
    cards::{Card, DeckKind},
    evaluator::best_hand,
    pot::{Contribution, build_pots, split_pot},
    state::{
        ActionKind, GameEvent, GameMeta, GamePlayerState, GameRound, GameState, GameStatus,
        HandResult, PlayerResult, PotResult, Position,
    },
};

/// One hand under the reference rules
#[derive(Debug)]
pub struct HoldemGame {
    state: GameState,
    deck: Vec<Card>,
    deck_idx: usize,
    events: VecDeque<GameEvent>,
    is_started: bool,
    ante_paid: Vec<bool>,
}

impl HoldemGame {
    /// Create a hand dealing from `deck` in order (no burn cards)
    pub fn new(options: GameOptions, deck: Vec<Card>) -> GameResult<Self> {
        options.validate().map_err(GameError::InvalidOptions)?;

        let needed = options.players.len() * options.hole_cards_count + 5;
        if deck.len() < needed {
            return Err(GameError::InvalidOptions(format!(
                "Deck has {} cards, {} needed",
                deck.len(),
                needed
            )));
        }

        let players: Vec<GamePlayerState> = options
            .players
            .iter()
            .enumerate()
            .map(|(idx, setting)| GamePlayerState {
                idx,
                positions: setting.positions.clone(),
                bankroll: setting.bankroll,
                initial_bankroll: setting.bankroll,
                wager: 0,
                pot: 0,
                fold: false,
                acted: false,
                did_action: None,
                hole_cards: vec![],
                combination_power: 0,
                is_ready: false,
            })
            .collect();
        let player_count = players.len();

        let state = GameState {
            game_id: Uuid::new_v4().to_string(),
            meta: GameMeta {
                deck: options.deck,
                hole_cards_count: options.hole_cards_count,
                required_hole_cards_count: options.required_hole_cards_count,
                ante: options.ante,
                blind: options.blind,
            },
            status: GameStatus {
                min_raise: options.blind.bb.max(1),
                ..GameStatus::default()
            },
            players,
            result: None,
        };

        Ok(Self {
            state,
            deck,
            deck_idx: 0,
            events: VecDeque::new(),
            is_started: false,
            ante_paid: vec![false; player_count],
        })
    }

    fn emit(&mut self, event: GameEvent) {
        self.state.status.current_event = event;
        self.events.push_back(event);
    }

    fn expect_event(&self, allowed: &[GameEvent]) -> GameResult<()> {
        let current = self.state.status.current_event;
        if !self.is_started || !allowed.contains(&current) {
            return Err(GameError::InvalidEvent(current.name()));
        }
        Ok(())
    }

    fn player_count(&self) -> usize {
        self.state.players.len()
    }

    fn player_mut(&mut self, idx: usize) -> GameResult<&mut GamePlayerState> {
        self.state
            .players
            .get_mut(idx)
            .ok_or(GameError::UnknownPlayer(idx))
    }

    fn position_idx(&self, position: Position) -> Option<usize> {
        self.state
            .players
            .iter()
            .position(|p| p.has_position(position))
    }

    fn can_act(&self, idx: usize) -> bool {
        self.state
            .players
            .get(idx)
            .is_some_and(|p| !p.fold && p.bankroll > 0)
    }

    fn deal(&mut self) -> Option<Card> {
        let card = self.deck.get(self.deck_idx).copied();
        self.deck_idx += 1;
        card
    }

    /// Move up to `chips` from bankroll to the current wager
    fn put_in(&mut self, idx: usize, chips: i64) -> i64 {
        let Some(player) = self.state.players.get_mut(idx) else {
            return 0;
        };
        let amount = chips.min(player.bankroll).max(0);
        player.bankroll -= amount;
        player.wager += amount;
        amount
    }

    fn pay_one_ante(&mut self, idx: usize) {
        let ante = self.state.meta.ante;
        let dealer = self.state.meta.blind.dealer;
        let Some(player) = self.state.players.get_mut(idx) else {
            return;
        };

        let due = if player.has_position(Position::Dealer) {
            ante + dealer
        } else {
            ante
        };
        let amount = due.min(player.bankroll);
        player.bankroll -= amount;
        player.pot += amount;
        self.ante_paid[idx] = true;
    }

    fn post_blinds(&mut self) {
        let blind = self.state.meta.blind;
        if let Some(idx) = self.position_idx(Position::Sb) {
            self.put_in(idx, blind.sb);
        }
        if let Some(idx) = self.position_idx(Position::Bb) {
            self.put_in(idx, blind.bb);
        }
        self.emit(GameEvent::BlindsReceived);
        self.init_round(GameRound::Preflop);
    }

    fn init_round(&mut self, round: GameRound) {
        let status = &mut self.state.status;
        status.current_round = round;
        status.current_raiser = None;
        status.min_raise = self.state.meta.blind.bb.max(1);
        status.current_wager = self.state.players.iter().map(|p| p.wager).max().unwrap_or(0);

        for player in self.state.players.iter_mut() {
            player.acted = false;
            player.is_ready = false;
            player.did_action = None;
        }
        self.emit(GameEvent::RoundInitialized);
    }

    /// First actor: after the BB preflop, after the dealer on later streets
    fn prepare_round(&mut self) {
        let from = match self.state.status.current_round {
            GameRound::Preflop => self.position_idx(Position::Bb).unwrap_or(0),
            _ => 0,
        };
        match self.next_actor(from) {
            Some(idx) => {
                self.state.status.current_player = idx;
                self.emit(GameEvent::RoundPrepared);
            }
            None => self.emit(GameEvent::RoundClosed),
        }
    }

    /// Next player after `from` that still owes an action this round
    fn next_actor(&self, from: usize) -> Option<usize> {
        let n = self.player_count();
        let current_wager = self.state.status.current_wager;
        let actors: Vec<usize> = (0..n).filter(|idx| self.can_act(*idx)).collect();

        // A lone player with chips has nobody left to bet against
        if let [only] = actors.as_slice()
            && self.state.players[*only].wager >= current_wager
        {
            return None;
        }

        (1..=n).map(|offset| (from + offset) % n).find(|idx| {
            let player = &self.state.players[*idx];
            self.can_act(*idx) && (!player.acted || player.wager < current_wager)
        })
    }

    /// Current player, ready to take a betting action
    fn actor(&self) -> GameResult<usize> {
        self.expect_event(&[GameEvent::RoundPrepared])?;
        let idx = self.state.status.current_player;
        if !self.can_act(idx) {
            return Err(GameError::NotCurrentPlayer);
        }
        Ok(idx)
    }

    /// Everybody else must act again after a full bet or raise
    fn reopen(&mut self, raiser: usize) {
        for player in self.state.players.iter_mut() {
            if player.idx != raiser {
                player.acted = false;
            }
        }
        self.state.status.current_raiser = Some(raiser);
    }

    fn finish_action(&mut self, idx: usize, action: ActionKind) {
        if let Some(player) = self.state.players.get_mut(idx) {
            player.acted = true;
            player.did_action = Some(action);
        }

        if self.state.not_folded_count() <= 1 {
            self.finish_hand();
            return;
        }

        match self.next_actor(idx) {
            Some(next) => {
                self.state.status.current_player = next;
                self.emit(GameEvent::RoundPrepared);
            }
            None => self.emit(GameEvent::RoundClosed),
        }
    }

    fn collect_wagers(&mut self) {
        for player in self.state.players.iter_mut() {
            player.pot += player.wager;
            player.wager = 0;
        }
        self.state.status.current_wager = 0;
    }

    fn deal_board_to(&mut self, size: usize) {
        while self.state.status.board.len() < size {
            match self.deal() {
                Some(card) => self.state.status.board.push(card),
                None => break,
            }
        }
    }

    /// Order in which odd chips are handed out: first seat after the dealer first
    fn odd_chip_order(&self, idx: usize) -> usize {
        let n = self.player_count();
        (idx + n - 1) % n
    }

    fn finish_hand(&mut self) {
        self.collect_wagers();

        let is_showdown = self.state.not_folded_count() > 1;
        if is_showdown {
            self.deal_board_to(5);
            let short_deck = self.state.meta.deck == DeckKind::ShortDeck;
            let required = self.state.meta.required_hole_cards_count;
            let board = self.state.status.board.clone();
            for player in self.state.players.iter_mut().filter(|p| !p.fold) {
                player.combination_power = best_hand(&player.hole_cards, &board, required, short_deck)
                    .map(|rank| rank.power())
                    .unwrap_or(0);
            }
        }

        let contributions: Vec<Contribution> = self
            .state
            .players
            .iter()
            .map(|p| Contribution {
                idx: p.idx,
                chips: p.pot,
                folded: p.fold,
            })
            .collect();
        let remaining: Vec<usize> = self
            .state
            .players
            .iter()
            .filter(|p| !p.fold)
            .map(|p| p.idx)
            .collect();

        let mut pots = Vec::new();
        for pot in build_pots(&contributions) {
            let eligible = if pot.eligible.is_empty() {
                remaining.clone()
            } else {
                pot.eligible
            };
            let best = eligible
                .iter()
                .map(|idx| self.state.players[*idx].combination_power)
                .max()
                .unwrap_or(0);
            let mut winners: Vec<usize> = eligible
                .into_iter()
                .filter(|idx| self.state.players[*idx].combination_power == best)
                .collect();
            winners.sort_by_key(|idx| self.odd_chip_order(*idx));

            for (idx, chips) in split_pot(pot.total, &winners) {
                self.state.players[idx].bankroll += chips;
            }
            pots.push(PotResult {
                total: pot.total,
                winners,
            });
        }

        let players = self
            .state
            .players
            .iter()
            .map(|p| PlayerResult {
                idx: p.idx,
                final_bankroll: p.bankroll,
                changed: p.bankroll - p.initial_bankroll,
            })
            .collect();
        self.state.result = Some(HandResult { players, pots });
        self.emit(GameEvent::GameClosed);
    }
}

impl GameEngine for HoldemGame {
    fn start(&mut self) -> GameResult<()> {
        if self.is_started {
            return Err(GameError::AlreadyStarted);
        }
        self.is_started = true;

        let hole = self.state.meta.hole_cards_count;
        for idx in 0..self.player_count() {
            let cards = self.deck[idx * hole..(idx + 1) * hole].to_vec();
            self.state.players[idx].hole_cards = cards;
        }
        self.deck_idx = self.player_count() * hole;

        self.emit(GameEvent::ReadyRequested);
        Ok(())
    }

    fn ready(&mut self, idx: usize) -> GameResult<()> {
        self.expect_event(&[GameEvent::ReadyRequested, GameEvent::RoundInitialized])?;
        self.player_mut(idx)?.is_ready = true;
        Ok(())
    }

    fn ready_for_all(&mut self) -> GameResult<()> {
        self.expect_event(&[GameEvent::ReadyRequested, GameEvent::RoundInitialized])?;
        for player in self.state.players.iter_mut() {
            player.is_ready = true;
        }

        match self.state.status.current_event {
            GameEvent::ReadyRequested => {
                let meta = &self.state.meta;
                if meta.ante > 0 || meta.blind.dealer > 0 {
                    self.emit(GameEvent::Prepared);
                } else {
                    self.post_blinds();
                }
            }
            _ => self.prepare_round(),
        }
        Ok(())
    }

    fn pay_ante(&mut self) -> GameResult<()> {
        self.expect_event(&[GameEvent::Prepared])?;
        for idx in 0..self.player_count() {
            if !self.ante_paid[idx] {
                self.pay_one_ante(idx);
            }
        }
        self.emit(GameEvent::AntesReceived);
        self.post_blinds();
        Ok(())
    }

    fn pay(&mut self, idx: usize, chips: i64) -> GameResult<()> {
        self.expect_event(&[GameEvent::Prepared, GameEvent::RoundInitialized])?;
        let blind = self.state.meta.blind;
        let ante = self.state.meta.ante;
        let round = self.state.status.current_round;
        let player = self.state.players.get(idx).ok_or(GameError::UnknownPlayer(idx))?;

        match self.state.status.current_event {
            GameEvent::Prepared => {
                if chips != ante {
                    return Err(GameError::InvalidWager(chips));
                }
                if self.ante_paid[idx] {
                    return Err(GameError::InvalidAction("ante already paid".to_string()));
                }
                self.pay_one_ante(idx);
            }
            _ => {
                // Blinds are posted automatically; this only confirms them
                let is_blind = (player.has_position(Position::Sb) && chips == blind.sb)
                    || (player.has_position(Position::Bb) && chips == blind.bb);
                if round != GameRound::Preflop || !is_blind {
                    return Err(GameError::InvalidWager(chips));
                }
            }
        }

        let player = self.player_mut(idx)?;
        player.did_action = Some(ActionKind::Pay);
        Ok(())
    }

    fn bet(&mut self, chips: i64) -> GameResult<()> {
        let idx = self.actor()?;
        if self.state.status.current_wager > 0 {
            return Err(GameError::InvalidAction("cannot bet facing a wager".to_string()));
        }
        if chips <= 0 {
            return Err(GameError::InvalidWager(chips));
        }
        if chips > self.state.players[idx].bankroll {
            return Err(GameError::InsufficientBankroll);
        }

        self.put_in(idx, chips);
        self.state.status.current_wager = chips;
        self.state.status.min_raise = chips;
        self.reopen(idx);
        self.finish_action(idx, ActionKind::Bet);
        Ok(())
    }

    fn raise(&mut self, chip_level: i64) -> GameResult<()> {
        let idx = self.actor()?;
        let current_wager = self.state.status.current_wager;
        let player = &self.state.players[idx];
        if current_wager == 0 {
            return Err(GameError::InvalidAction("nothing to raise".to_string()));
        }
        if chip_level <= current_wager {
            return Err(GameError::InvalidWager(chip_level));
        }

        let cost = chip_level - player.wager;
        if cost > player.bankroll {
            return Err(GameError::InsufficientBankroll);
        }
        let raise_size = chip_level - current_wager;
        let is_allin = cost == player.bankroll;
        if raise_size < self.state.status.min_raise && !is_allin {
            return Err(GameError::InvalidWager(chip_level));
        }

        self.put_in(idx, cost);
        self.state.status.current_wager = chip_level;
        if raise_size >= self.state.status.min_raise {
            self.state.status.min_raise = raise_size;
        }
        self.reopen(idx);
        self.finish_action(idx, ActionKind::Raise);
        Ok(())
    }

    fn call(&mut self) -> GameResult<()> {
        let idx = self.actor()?;
        let to_call = self.state.status.current_wager - self.state.players[idx].wager;
        if to_call <= 0 {
            return Err(GameError::InvalidAction("nothing to call".to_string()));
        }

        self.put_in(idx, to_call);
        self.finish_action(idx, ActionKind::Call);
        Ok(())
    }

    fn check(&mut self) -> GameResult<()> {
        let idx = self.actor()?;
        if self.state.players[idx].wager < self.state.status.current_wager {
            return Err(GameError::InvalidAction("cannot check facing a wager".to_string()));
        }

        self.finish_action(idx, ActionKind::Check);
        Ok(())
    }

    fn allin(&mut self) -> GameResult<()> {
        let idx = self.actor()?;
        let bankroll = self.state.players[idx].bankroll;
        self.put_in(idx, bankroll);

        let wager = self.state.players[idx].wager;
        let current_wager = self.state.status.current_wager;
        if wager > current_wager {
            let raise_size = wager - current_wager;
            self.state.status.current_wager = wager;
            // A short all-in does not reopen the betting
            if raise_size >= self.state.status.min_raise {
                self.state.status.min_raise = raise_size;
                self.reopen(idx);
            }
        }

        self.finish_action(idx, ActionKind::Allin);
        Ok(())
    }

    fn fold(&mut self) -> GameResult<()> {
        let idx = self.actor()?;
        self.player_mut(idx)?.fold = true;
        self.finish_action(idx, ActionKind::Fold);
        Ok(())
    }

    fn pass(&mut self) -> GameResult<()> {
        let idx = self.actor()?;
        if self.state.players[idx].wager < self.state.status.current_wager {
            self.player_mut(idx)?.fold = true;
        }
        self.finish_action(idx, ActionKind::Pass);
        Ok(())
    }

    fn next(&mut self) -> GameResult<()> {
        self.expect_event(&[GameEvent::RoundClosed])?;
        if self.state.not_folded_count() <= 1 {
            self.finish_hand();
            return Ok(());
        }

        self.collect_wagers();
        let actors = (0..self.player_count()).filter(|idx| self.can_act(*idx)).count();
        let next_round = self.state.status.current_round.next();

        match next_round {
            Some(round) if actors >= 2 => {
                let board_size = match round {
                    GameRound::Flop => 3,
                    GameRound::Turn => 4,
                    _ => 5,
                };
                self.deal_board_to(board_size);
                self.init_round(round);
            }
            // River done, or nobody left to bet: run the board out
            _ => self.finish_hand(),
        }
        Ok(())
    }

    fn state(&self) -> &GameState {
        &self.state
    }

    fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }
}

/// Creates [`HoldemGame`] hands
#[derive(Debug, Default)]
pub struct HoldemFactory {
    seed: Option<u64>,
    deck: Option<Vec<Card>>,
    hands: AtomicU64,
}

impl HoldemFactory {
    /// Factory dealing from freshly shuffled decks
    pub fn new() -> Self {
        Self::default()
    }

    /// Reproducible shuffles; every hand advances the seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Deal every hand from the same preset deck
    ///
    /// Player `i` receives cards `[i * h, (i + 1) * h)`, the board follows.
    pub fn with_deck(cards: Vec<Card>) -> Self {
        Self {
            deck: Some(cards),
            ..Self::default()
        }
    }
}

impl GameFactory for HoldemFactory {
    fn create(&self, options: GameOptions) -> GameResult<Box<dyn GameEngine>> {
        let hand = self.hands.fetch_add(1, Ordering::SeqCst);
        let deck = match &self.deck {
            Some(cards) => cards.clone(),
            None => options.deck.shuffled(self.seed.map(|seed| seed.wrapping_add(hand))),
        };
        Ok(Box::new(HoldemGame::new(options, deck)?))
    }
}
