//! Table worker: owns the table and drains its command channel.

use std::{collections::HashSet, sync::Arc};
use tokio::sync::mpsc;

use super::{
    events::{Observers, PlayerGameAction, TableStateEvent, UpdateEvent},
    messages::{Request, TableAction, send_internal},
};
use crate::{
    blind::BlindSchedule,
    clock::Clock,
    config::EngineOptions,
    errors::{TableError, TableResult},
    game::{ActionKind, GameAdapter, GameFactory},
    ready_group::ReadyGroup,
    seat::SeatManager,
    table::{JoinPlayer, Table, TablePlayerState, TableStatus},
    timebank::TimeBank,
};

/// Worker owning one table
///
/// Every mutation of the table happens inside [`TableActor::run`]. Timers and
/// ready groups only enqueue internal commands through a weak sender, so
/// the worker stops once every [`super::TableEngine`] handle is gone.
pub struct TableActor {
    pub(super) table: Table,
    pub(super) options: EngineOptions,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) seats: SeatManager,
    pub(super) blinds: BlindSchedule,
    pub(super) factory: Arc<dyn GameFactory>,
    /// Evaluator of the running hand
    pub(super) game: Option<GameAdapter>,
    pub(super) timebank: TimeBank,

    /// Round-start acknowledgements, indexed by game player
    pub(super) round_readies: ReadyGroup,
    /// Ante payments, indexed by game player
    pub(super) ante_readies: ReadyGroup,
    /// Next-hand gate, indexed by seat
    pub(super) open_game_readies: ReadyGroup,

    pub(super) observers: Observers,
    inbox: mpsc::UnboundedReceiver<Request>,
    pub(super) sender: mpsc::WeakUnboundedSender<Request>,

    pub(super) is_released: bool,
    is_deleted: bool,

    /// Deferred until the running hand settles
    pub(super) pending_leaves: Vec<String>,
    pub(super) pending_redeems: Vec<JoinPlayer>,
    pub(super) balance_requested: bool,
    /// The end-of-table callback is waiting on its delay
    pub(super) pending_auto_end: bool,

    /// Tags the current between-hand schedule; stale timers carry an older id
    pub(super) schedule_id: u64,
    pub(super) open_ready_done: bool,
    pub(super) open_interval_done: bool,
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Arguments
    ///
    /// * `table` - Freshly created table
    /// * `blinds` - Inactive blind schedule of the table
    /// * `options` - Engine options
    /// * `clock` - Unix time source
    /// * `factory` - Evaluator factory
    /// * `observers` - Registered callbacks
    /// * `inbox` - Command channel
    /// * `sender` - Weak handle on the same channel for timers and ready groups
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        table: Table,
        blinds: BlindSchedule,
        options: EngineOptions,
        clock: Arc<dyn Clock>,
        factory: Arc<dyn GameFactory>,
        observers: Observers,
        inbox: mpsc::UnboundedReceiver<Request>,
        sender: mpsc::WeakUnboundedSender<Request>,
    ) -> Self {
        let seats = SeatManager::new(table.meta.max_seats, table.meta.rule);
        let timebank = TimeBank::with_clock(clock.clone());

        Self {
            round_readies: ReadyGroup::new().with_auto_ready_timeout(options.ready_timeout_secs),
            ante_readies: ReadyGroup::new().with_auto_ready_timeout(options.ready_timeout_secs),
            open_game_readies: ReadyGroup::new()
                .with_auto_ready_timeout(options.open_game_timeout_secs),
            table,
            options,
            clock,
            seats,
            blinds,
            factory,
            game: None,
            timebank,
            observers,
            inbox,
            sender,
            is_released: false,
            is_deleted: false,
            pending_leaves: vec![],
            pending_redeems: vec![],
            balance_requested: false,
            pending_auto_end: false,
            schedule_id: 0,
            open_ready_done: false,
            open_interval_done: false,
        }
    }

    /// Run the table worker until deleted or every handle is dropped
    pub async fn run(mut self) {
        log::info!("Table {}: worker started", self.table.id);

        while let Some(Request { action, reply }) = self.inbox.recv().await {
            let name = action.name();
            log::debug!("Table {}: handling {}", self.table.id, name);

            let result = self.handle_action(action).map(|_| self.table.clone());
            if let Err(err) = &result {
                log::error!("Table {}: {} failed: {}", self.table.id, name, err);
                self.emit_error(err);
            }

            if let Some(reply) = reply {
                let _ = reply.send(result);
            }

            if self.is_deleted {
                break;
            }
        }

        self.release();
        log::info!("Table {}: worker stopped", self.table.id);
    }

    fn handle_action(&mut self, action: TableAction) -> TableResult<()> {
        if action.is_internal() && self.is_released {
            log::warn!("Table {}: ignoring {} after release", self.table.id, action.name());
            return Ok(());
        }

        match action {
            TableAction::GetTable => Ok(()),
            TableAction::CloseTable => self.handle_close(),
            TableAction::DeleteTable => self.handle_delete(),
            TableAction::BalanceTable => self.handle_balance(),
            TableAction::StartTableGame => self.handle_start_table_game(),
            TableAction::TableGameOpen => {
                self.ensure_not_released()?;
                self.table_game_open()
            }

            TableAction::PlayerReserve(player) => self.handle_reserve(player),
            TableAction::PlayersBatchReserve(players) => self.handle_batch_reserve(players),
            TableAction::PlayerJoin { player_id } => self.handle_join(&player_id),
            TableAction::PlayerRedeemChips(player) => self.handle_redeem(player),
            TableAction::PlayersLeave(player_ids) => self.handle_leave(player_ids),

            TableAction::PlayerReady { player_id } => self.handle_ready(&player_id),
            TableAction::PlayerPay { player_id, chips } => self.handle_pay(&player_id, chips),
            TableAction::PlayerBet { player_id, chips } => {
                self.handle_bet_action(&player_id, ActionKind::Bet, chips)
            }
            TableAction::PlayerRaise {
                player_id,
                chip_level,
            } => self.handle_bet_action(&player_id, ActionKind::Raise, chip_level),
            TableAction::PlayerCall { player_id } => {
                self.handle_bet_action(&player_id, ActionKind::Call, 0)
            }
            TableAction::PlayerAllin { player_id } => {
                self.handle_bet_action(&player_id, ActionKind::Allin, 0)
            }
            TableAction::PlayerCheck { player_id } => {
                self.handle_bet_action(&player_id, ActionKind::Check, 0)
            }
            TableAction::PlayerFold { player_id } => {
                self.handle_bet_action(&player_id, ActionKind::Fold, 0)
            }
            TableAction::PlayerPass { player_id } => {
                self.handle_bet_action(&player_id, ActionKind::Pass, 0)
            }

            TableAction::RoundReadiesCompleted { game_count } => {
                self.handle_round_readies_completed(game_count)
            }
            TableAction::AnteReadiesCompleted { game_count } => {
                self.handle_ante_readies_completed(game_count)
            }
            TableAction::OpenGameReadiesCompleted { schedule_id } => {
                self.handle_open_game_gate(schedule_id, true)
            }
            TableAction::OpenGameIntervalElapsed { schedule_id } => {
                self.handle_open_game_gate(schedule_id, false)
            }
            TableAction::BreakEnded { schedule_id } => self.handle_break_ended(schedule_id),
            TableAction::AutoGameOpenEnd => {
                self.flush_auto_game_open_end();
                Ok(())
            }
        }
    }

    // ===== Lifecycle =====

    pub(super) fn ensure_not_released(&self) -> TableResult<()> {
        if self.is_released {
            return Err(TableError::TableClosed);
        }
        Ok(())
    }

    /// Stop every timer and ready group
    fn release(&mut self) {
        self.flush_auto_game_open_end();
        self.is_released = true;
        self.timebank.cancel();
        self.stop_hand_readies();
        self.open_game_readies.stop();
    }

    pub(super) fn stop_hand_readies(&mut self) {
        self.round_readies.stop();
        self.ante_readies.stop();
    }

    fn handle_close(&mut self) -> TableResult<()> {
        if self.table.state.status == TableStatus::Closed {
            return Ok(());
        }

        self.release();
        self.game = None;
        self.set_status(TableStatus::Closed);
        self.emit_table_updated("CloseTable", vec![]);
        log::info!("Table {}: closed", self.table.id);
        Ok(())
    }

    fn handle_delete(&mut self) -> TableResult<()> {
        self.handle_close()?;
        self.is_deleted = true;
        self.emit_table_updated("DeleteTable", vec![]);
        Ok(())
    }

    fn handle_balance(&mut self) -> TableResult<()> {
        self.ensure_not_released()?;

        if matches!(
            self.table.state.status,
            TableStatus::GameOpened | TableStatus::GamePlaying
        ) {
            log::debug!("Table {}: balance deferred until settlement", self.table.id);
            self.balance_requested = true;
            return Ok(());
        }

        self.enter_balancing();
        Ok(())
    }

    pub(super) fn enter_balancing(&mut self) {
        self.balance_requested = false;
        self.flush_auto_game_open_end();
        self.timebank.cancel();
        self.open_game_readies.stop();
        self.set_status(TableStatus::Balancing);
        self.emit_table_updated("BalanceTable", vec![]);
    }

    fn handle_start_table_game(&mut self) -> TableResult<()> {
        self.ensure_not_released()?;
        if self.table.state.status != TableStatus::Created {
            return Err(TableError::TableOpenGameFailed);
        }

        let now = self.clock.now();
        self.table.state.start_at = now;
        self.blinds.activate(now);
        self.table.state.blind_state = self.blinds.current(now);
        self.emit_table_updated("StartTableGame", vec![]);
        log::info!("Table {}: started at {}", self.table.id, now);

        if let Some(f) = self.observers.ready_open_first_table_game.clone() {
            f(&self.table);
        }

        if self.should_pause() {
            self.pause();
            return Ok(());
        }
        self.open_or_pause()
    }

    // ===== Membership =====

    fn handle_reserve(&mut self, player: JoinPlayer) -> TableResult<()> {
        self.ensure_not_released()?;
        if player.redeem_chips <= 0 {
            return Err(TableError::InvalidChips(player.redeem_chips));
        }
        if self.table.find_player_idx(&player.player_id).is_some() {
            return Err(TableError::DuplicatePlayers);
        }
        if self.table.state.player_states.len() >= self.table.meta.max_seats {
            return Err(TableError::NoEmptySeats);
        }

        let seat = match player.seat {
            Some(seat) => {
                self.seats.assign_seats(&[(player.player_id.clone(), seat)])?;
                seat
            }
            None => {
                let assigned = self.seats.random_assign_seats(&[player.player_id.clone()])?;
                assigned
                    .first()
                    .map(|(_, seat)| *seat)
                    .ok_or(TableError::NotEnoughSeats)?
            }
        };

        self.add_player_state(&player, seat);
        self.emit_table_updated("PlayerReserve", vec![player.player_id.clone()]);
        self.emit_player_reserved(&player.player_id);
        Ok(())
    }

    pub(super) fn handle_batch_reserve(&mut self, players: Vec<JoinPlayer>) -> TableResult<()> {
        self.ensure_not_released()?;
        if players.is_empty() {
            return Ok(());
        }

        let mut ids = HashSet::new();
        for player in &players {
            if player.redeem_chips <= 0 {
                return Err(TableError::InvalidChips(player.redeem_chips));
            }
            if !ids.insert(player.player_id.as_str())
                || self.table.find_player_idx(&player.player_id).is_some()
            {
                return Err(TableError::DuplicatePlayers);
            }
        }
        if self.table.state.player_states.len() + players.len() > self.table.meta.max_seats {
            return Err(TableError::NotEnoughSeats);
        }

        // Explicit seats first, the rest drawn from what they leave free
        let explicit: HashSet<usize> = players.iter().filter_map(|p| p.seat).collect();
        let random_count = players.iter().filter(|p| p.seat.is_none()).count();
        let mut free = self
            .seats
            .random_pick_empty_seats(self.seats.empty_seat_count())?
            .into_iter()
            .filter(|seat| !explicit.contains(seat));

        let mut assignments = Vec::with_capacity(players.len());
        for player in &players {
            let seat = match player.seat {
                Some(seat) => seat,
                None => free.next().ok_or(TableError::NotEnoughSeats)?,
            };
            assignments.push((player.player_id.clone(), seat));
        }
        log::debug!(
            "Table {}: batch reserving {} players ({} random)",
            self.table.id,
            assignments.len(),
            random_count
        );
        self.seats.assign_seats(&assignments)?;

        for (player, (_, seat)) in players.iter().zip(assignments.iter()) {
            self.add_player_state(player, *seat);
        }

        let player_ids: Vec<String> = players.iter().map(|p| p.player_id.clone()).collect();
        self.emit_table_updated("PlayersBatchReserve", player_ids.clone());
        for player_id in &player_ids {
            self.emit_player_reserved(player_id);
        }
        Ok(())
    }

    fn add_player_state(&mut self, player: &JoinPlayer, seat: usize) {
        let mut state = TablePlayerState::new(&player.player_id, seat as i32, player.redeem_chips);
        state.is_between_dealer_bb = self.seats.is_player_between_dealer_bb(&player.player_id);
        self.table.state.player_states.push(state);
        self.table.rebuild_seat_map();
    }

    fn handle_join(&mut self, player_id: &str) -> TableResult<()> {
        self.ensure_not_released()?;
        let idx = self
            .table
            .find_player_idx(player_id)
            .ok_or(TableError::PlayerNotFound)?;

        self.seats.join_players(&[player_id.to_string()])?;
        let seat = {
            let player = &mut self.table.state.player_states[idx];
            player.is_in = true;
            player.is_between_dealer_bb = self.seats.is_player_between_dealer_bb(player_id);
            player.seat
        };

        // Late joiners may still acknowledge the next hand
        if self.open_game_readies.is_running() {
            self.open_game_readies.add(i64::from(seat), false);
        }

        self.emit_table_updated("PlayerJoin", vec![player_id.to_string()]);
        self.emit_player_state(idx);
        self.resume_if_possible();
        Ok(())
    }

    fn handle_redeem(&mut self, player: JoinPlayer) -> TableResult<()> {
        self.ensure_not_released()?;
        if player.redeem_chips <= 0 {
            return Err(TableError::InvalidChips(player.redeem_chips));
        }
        let idx = self
            .table
            .find_player_idx(&player.player_id)
            .ok_or(TableError::PlayerNotFound)?;

        if self.table.is_in_running_hand(&player.player_id) {
            log::debug!(
                "Table {}: redeem of {} deferred until settlement",
                self.table.id,
                player.player_id
            );
            self.pending_redeems.push(player);
            return Ok(());
        }

        self.table.state.player_states[idx].bankroll += player.redeem_chips;
        self.seats.update_player_has_chips(&player.player_id, true)?;
        self.emit_table_updated("PlayerRedeemChips", vec![player.player_id.clone()]);
        self.emit_player_state(idx);
        self.resume_if_possible();
        Ok(())
    }

    fn handle_leave(&mut self, mut player_ids: Vec<String>) -> TableResult<()> {
        self.ensure_not_released()?;
        let mut seen = HashSet::new();
        player_ids.retain(|id| seen.insert(id.clone()));
        if player_ids
            .iter()
            .any(|id| self.table.find_player_idx(id).is_none())
        {
            return Err(TableError::PlayerNotFound);
        }

        let (deferred, leaving): (Vec<String>, Vec<String>) = player_ids
            .into_iter()
            .partition(|id| self.table.is_in_running_hand(id));

        if !deferred.is_empty() {
            log::debug!(
                "Table {}: {} players leave after the running hand",
                self.table.id,
                deferred.len()
            );
            for id in deferred {
                if !self.pending_leaves.contains(&id) {
                    self.pending_leaves.push(id);
                }
            }
        }

        self.remove_players(&leaving)
    }

    /// Free the seats of `player_ids` and drop their records
    pub(super) fn remove_players(&mut self, player_ids: &[String]) -> TableResult<()> {
        if player_ids.is_empty() {
            return Ok(());
        }

        self.seats.remove_seats(player_ids)?;
        self.table.remove_players(player_ids);
        self.emit_table_updated("PlayersLeave", player_ids.to_vec());
        Ok(())
    }

    // ===== Emitters =====

    /// Bump the serial of the table; every emitted event gets a fresh one
    fn touch(&mut self) {
        self.table.update_serial += 1;
        self.table.update_at = self.clock.now_millis();
    }

    pub(super) fn set_status(&mut self, status: TableStatus) {
        if self.table.state.status == status {
            return;
        }
        log::debug!(
            "Table {}: status {:?} -> {:?}",
            self.table.id,
            self.table.state.status,
            status
        );
        self.table.state.status = status;
        self.emit_state_event(TableStateEvent::StatusUpdated(status));
    }

    pub(super) fn emit_table_updated(&mut self, name: &str, player_ids: Vec<String>) {
        self.touch();
        if let Some(f) = self.observers.table_updated.clone() {
            let event = UpdateEvent {
                name: name.to_string(),
                player_ids,
            };
            f(&self.table, &event);
        }
    }

    pub(super) fn emit_state_event(&mut self, event: TableStateEvent) {
        self.touch();
        if let Some(f) = self.observers.table_state_updated.clone() {
            f(event, &self.table);
        }
    }

    pub(super) fn emit_player_state(&mut self, idx: usize) {
        self.touch();
        let (Some(f), Some(player)) = (
            self.observers.table_player_state_updated.clone(),
            self.table.state.player_states.get(idx),
        ) else {
            return;
        };
        f(&self.table.meta.competition_id, &self.table.id, player);
    }

    fn emit_player_reserved(&mut self, player_id: &str) {
        self.touch();
        let Some(idx) = self.table.find_player_idx(player_id) else {
            return;
        };
        if let Some(f) = self.observers.table_player_reserved.clone() {
            let player = &self.table.state.player_states[idx];
            f(&self.table.meta.competition_id, &self.table.id, player);
        }
    }

    pub(super) fn emit_player_action(
        &mut self,
        game_idx: usize,
        action: ActionKind,
        chips: i64,
        round: &str,
    ) {
        self.touch();
        let Some(f) = self.observers.game_player_action_updated.clone() else {
            return;
        };
        let Some(player) = self
            .table
            .state
            .game_player_indexes
            .get(game_idx)
            .and_then(|idx| self.table.state.player_states.get(*idx))
        else {
            return;
        };

        let event = PlayerGameAction {
            table_id: self.table.id.clone(),
            game_id: self
                .table
                .state
                .game_state
                .as_ref()
                .map(|gs| gs.game_id.clone())
                .unwrap_or_default(),
            game_count: self.table.state.game_count,
            round: round.to_string(),
            player_id: player.player_id.clone(),
            action,
            chips,
            seat: player.seat,
            update_at: self.table.update_at,
        };
        f(&event);
    }

    pub(super) fn emit_error(&mut self, err: &TableError) {
        self.touch();
        if let Some(f) = self.observers.error_updated.clone() {
            f(&self.table, err);
        }
    }

    /// Hand an internal command back to this worker
    pub(super) fn internal_sender(&self) -> impl Fn(TableAction) + Send + Sync + 'static {
        let sender = self.sender.clone();
        move |action| send_internal(&sender, action)
    }
}
