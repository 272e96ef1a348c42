//! Hand progression: evaluator events, ready groups and player actions.

use super::{actor::TableActor, events::TableStateEvent, messages::TableAction};
use crate::{
    errors::{TableError, TableResult},
    game::{ActionKind, AdapterEvent, GameAdapter, GameEvent, GameRound, GameState, Position},
};

impl TableActor {
    pub(super) fn game_mut(&mut self) -> TableResult<&mut GameAdapter> {
        self.game.as_mut().ok_or(TableError::PlayerInvalidAction)
    }

    fn current_event(&self) -> Option<GameEvent> {
        self.table
            .state
            .game_state
            .as_ref()
            .map(GameState::current_event)
    }

    /// React to what one evaluator call produced
    pub(super) fn apply_game_events(&mut self, events: Vec<AdapterEvent>) -> TableResult<()> {
        for event in events {
            match event {
                AdapterEvent::AntesReceived => self.emit_ante_actions(),
                AdapterEvent::BlindsReceived => self.emit_blind_actions(),
                AdapterEvent::RoundClosed => self.table.state.current_action_end_at = 0,
                AdapterEvent::StateUpdated(gs) => self.update_game_state(gs)?,
            }
        }
        Ok(())
    }

    fn update_game_state(&mut self, gs: GameState) -> TableResult<()> {
        let event = gs.current_event();
        self.table.state.game_state = Some(gs);

        if event == GameEvent::GameClosed {
            return self.settle();
        }

        self.emit_table_updated(event.name(), vec![]);
        self.emit_state_event(TableStateEvent::GameUpdated);

        match event {
            GameEvent::ReadyRequested | GameEvent::RoundInitialized => self.start_round_readies(),
            GameEvent::Prepared => self.start_ante_readies(),
            GameEvent::RoundPrepared => {
                self.table.state.current_action_end_at =
                    self.clock.now() + self.table.meta.action_time_secs;
            }
            GameEvent::RoundClosed => {
                let events = self.game_mut()?.next()?;
                self.apply_game_events(events)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_ante_actions(&mut self) {
        let blind = self.table.state.game_blind_state;
        let Some(gs) = self.table.state.game_state.clone() else {
            return;
        };
        // Players who paid on their own were reported when they did
        for player in gs.players.iter().filter(|p| p.did_action != Some(ActionKind::Pay)) {
            let chips = if player.has_position(Position::Dealer) {
                blind.ante + blind.dealer
            } else {
                blind.ante
            };
            self.emit_player_action(player.idx, ActionKind::Pay, chips, "ante");
        }
    }

    fn emit_blind_actions(&mut self) {
        let blind = self.table.state.game_blind_state;
        let Some(gs) = self.table.state.game_state.clone() else {
            return;
        };
        for player in &gs.players {
            let round = GameRound::Preflop.name();
            if player.has_position(Position::Sb) {
                self.emit_player_action(player.idx, ActionKind::Pay, blind.sb, round);
            }
            if player.has_position(Position::Bb) {
                self.emit_player_action(player.idx, ActionKind::Pay, blind.bb, round);
            }
        }
    }

    // ===== Ready groups =====

    /// Every participant acknowledges the new round; the group then calls ready-for-all
    fn start_round_readies(&mut self) {
        let game_count = self.table.state.game_count;
        let participants = self.table.state.game_player_indexes.len();
        let send = self.internal_sender();

        self.round_readies.stop();
        self.round_readies.reset_participants();
        for idx in 0..participants {
            self.round_readies.add(idx as i64, false);
        }
        self.round_readies
            .on_completed(move || send(TableAction::RoundReadiesCompleted { game_count }));
        log::debug!("Table {}: round readies started for hand {}", self.table.id, game_count);
        self.round_readies.start();
    }

    fn start_ante_readies(&mut self) {
        let game_count = self.table.state.game_count;
        let participants = self.table.state.game_player_indexes.len();
        let send = self.internal_sender();

        self.ante_readies.stop();
        self.ante_readies.reset_participants();
        for idx in 0..participants {
            self.ante_readies.add(idx as i64, false);
        }
        self.ante_readies
            .on_completed(move || send(TableAction::AnteReadiesCompleted { game_count }));
        log::debug!("Table {}: ante readies started for hand {}", self.table.id, game_count);
        self.ante_readies.start();
    }

    fn is_current_hand(&self, game_count: i64) -> bool {
        self.game.is_some() && self.table.is_playing() && self.table.state.game_count == game_count
    }

    pub(super) fn handle_round_readies_completed(&mut self, game_count: i64) -> TableResult<()> {
        if !self.is_current_hand(game_count)
            || !matches!(
                self.current_event(),
                Some(GameEvent::ReadyRequested | GameEvent::RoundInitialized)
            )
        {
            log::warn!("Table {}: stale round readies of hand {}", self.table.id, game_count);
            return Ok(());
        }

        let events = self.game_mut()?.ready_for_all()?;
        self.apply_game_events(events)
    }

    pub(super) fn handle_ante_readies_completed(&mut self, game_count: i64) -> TableResult<()> {
        if !self.is_current_hand(game_count) || self.current_event() != Some(GameEvent::Prepared) {
            log::warn!("Table {}: stale ante readies of hand {}", self.table.id, game_count);
            return Ok(());
        }

        let events = self.game_mut()?.pay_ante()?;
        self.apply_game_events(events)
    }

    // ===== Player actions =====

    pub(super) fn handle_ready(&mut self, player_id: &str) -> TableResult<()> {
        self.ensure_not_released()?;
        let player_idx = self
            .table
            .find_player_idx(player_id)
            .ok_or(TableError::PlayerNotFound)?;

        if let Some(game_idx) = self.table.game_player_index(player_id)
            && self.game.is_some()
            && self.round_readies.is_running()
            && self.round_readies.contains(game_idx as i64)
        {
            let events = self.game_mut()?.ready(game_idx)?;
            // Only the state is kept; the round already has its readies
            if let Some(AdapterEvent::StateUpdated(gs)) = events.into_iter().last() {
                self.table.state.game_state = Some(gs);
            }
            let round = self.current_round_name();
            self.emit_player_action(game_idx, ActionKind::Ready, 0, &round);
            self.emit_table_updated("PlayerReady", vec![player_id.to_string()]);
            self.round_readies.ready(game_idx as i64);
            return Ok(());
        }

        let seat = i64::from(self.table.state.player_states[player_idx].seat);
        if self.open_game_readies.is_running() && self.open_game_readies.contains(seat) {
            self.emit_table_updated("PlayerReady", vec![player_id.to_string()]);
            self.open_game_readies.ready(seat);
            return Ok(());
        }

        Err(TableError::InvalidReadyAction)
    }

    pub(super) fn handle_pay(&mut self, player_id: &str, chips: i64) -> TableResult<()> {
        self.ensure_not_released()?;
        let game_idx = self
            .table
            .game_player_index(player_id)
            .ok_or(TableError::PlayerNotFound)?;
        if self.game.is_none() || !self.table.is_playing() {
            return Err(TableError::InvalidPayAnteAction);
        }

        let round = self
            .table
            .state
            .game_state
            .as_ref()
            .map(|gs| gs.status.current_round)
            .unwrap_or_default();
        let blind = self.table.state.game_blind_state;

        match self.current_event() {
            Some(GameEvent::Prepared) if chips == blind.ante => {
                if !self.ante_readies.contains(game_idx as i64) {
                    return Err(TableError::InvalidPayAnteAction);
                }
                let events = self.game_mut()?.pay(game_idx, chips)?;
                if let Some(AdapterEvent::StateUpdated(gs)) = events.into_iter().last() {
                    self.table.state.game_state = Some(gs);
                }
                self.emit_player_action(game_idx, ActionKind::Pay, chips, "ante");
                self.emit_table_updated("PlayerPay", vec![player_id.to_string()]);
                self.ante_readies.ready(game_idx as i64);
                Ok(())
            }
            Some(GameEvent::RoundInitialized)
                if round == GameRound::Preflop && chips == blind.bb =>
            {
                let events = self.game_mut()?.pay(game_idx, chips)?;
                self.emit_player_action(game_idx, ActionKind::Pay, chips, round.name());
                self.emit_table_updated("PlayerPay", vec![player_id.to_string()]);
                // Everybody acknowledges the initialised round again
                self.apply_game_events(events)
            }
            _ => Err(TableError::InvalidPayAnteAction),
        }
    }

    /// Shared path of bet, raise, call, all-in, check, fold and pass
    pub(super) fn handle_bet_action(
        &mut self,
        player_id: &str,
        action: ActionKind,
        chips: i64,
    ) -> TableResult<()> {
        self.ensure_not_released()?;
        let game_idx = self
            .table
            .game_player_index(player_id)
            .ok_or(TableError::PlayerNotFound)?;

        let Some(gs) = self.table.state.game_state.as_ref() else {
            return Err(TableError::PlayerInvalidAction);
        };
        if !self.table.is_playing() || gs.status.current_player != game_idx {
            return Err(TableError::PlayerInvalidAction);
        }
        let round = gs.status.current_round.name();
        let bankroll_before = gs.player(game_idx).map(|p| p.bankroll).unwrap_or(0);

        let game = self.game_mut()?;
        let events = match action {
            ActionKind::Bet => game.bet(chips),
            ActionKind::Raise => game.raise(chips),
            ActionKind::Call => game.call(),
            ActionKind::Allin => game.allin(),
            ActionKind::Check => game.check(),
            ActionKind::Fold => game.fold(),
            ActionKind::Pass => game.pass(),
            ActionKind::Ready | ActionKind::Pay => return Err(TableError::PlayerInvalidAction),
        }?;
        let bankroll_after = game.state().player(game_idx).map(|p| p.bankroll).unwrap_or(0);

        log::debug!(
            "Table {}: {} {:?} {} in {}",
            self.table.id,
            player_id,
            action,
            chips,
            round
        );
        self.table.state.current_action_end_at = 0;
        self.emit_player_action(game_idx, action, bankroll_before - bankroll_after, round);
        self.emit_table_updated(verb_name(action), vec![player_id.to_string()]);
        self.apply_game_events(events)
    }

    fn current_round_name(&self) -> String {
        self.table
            .state
            .game_state
            .as_ref()
            .map(|gs| gs.status.current_round.name())
            .unwrap_or_default()
            .to_string()
    }
}

fn verb_name(action: ActionKind) -> &'static str {
    match action {
        ActionKind::Ready => "PlayerReady",
        ActionKind::Pay => "PlayerPay",
        ActionKind::Bet => "PlayerBet",
        ActionKind::Raise => "PlayerRaise",
        ActionKind::Call => "PlayerCall",
        ActionKind::Check => "PlayerCheck",
        ActionKind::Allin => "PlayerAllin",
        ActionKind::Fold => "PlayerFold",
        ActionKind::Pass => "PlayerPass",
    }
}
