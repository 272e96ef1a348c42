//! Settlement and the between-hand scheduler.

use tokio::time::Duration;

use super::{actor::TableActor, events::TableStateEvent, messages::TableAction};
use crate::{
    errors::TableResult,
    table::{CompetitionMode, TablePlayerGameStatistics, TableStatus},
};

impl TableActor {
    /// Apply the closed hand's result, then decide what comes next
    pub(super) fn settle(&mut self) -> TableResult<()> {
        self.set_status(TableStatus::GameSettled);
        self.stop_hand_readies();
        self.game = None;

        let Some(gs) = self.table.state.game_state.clone() else {
            log::error!("Table {}: hand closed without state", self.table.id);
            return self.continue_game();
        };

        if let Some(result) = &gs.result {
            for player in &result.players {
                if let Some(idx) = self.table.state.game_player_indexes.get(player.idx).copied()
                    && let Some(state) = self.table.state.player_states.get_mut(idx)
                {
                    state.bankroll = player.final_bankroll;
                }
            }
        }

        let not_folded = gs.not_folded_count();
        let best = gs
            .players
            .iter()
            .filter(|p| !p.fold)
            .map(|p| p.combination_power)
            .max()
            .unwrap_or(0);
        for player in &gs.players {
            let Some(idx) = self.table.state.game_player_indexes.get(player.idx).copied() else {
                continue;
            };
            self.table.state.player_states[idx].game_statistics = TablePlayerGameStatistics {
                showdown_winning_chance: not_folded > 1 && !player.fold,
                is_showdown_winning: !player.fold && player.combination_power == best,
            };
        }

        self.refresh_has_chips();
        let next_bb_order: Vec<String> = self
            .seats
            .player_ids_from_bb()
            .into_iter()
            .filter(|id| {
                self.table
                    .find_player_idx(id)
                    .is_some_and(|idx| self.table.state.player_states[idx].bankroll > 0)
            })
            .collect();
        self.table.state.next_bb_order_player_ids = next_bb_order;

        log::info!(
            "Table {}: hand {} settled",
            self.table.id,
            self.table.state.game_count
        );
        self.emit_table_updated("SettleTableGameResult", vec![]);
        self.emit_state_event(TableStateEvent::GameSettled);
        for idx in self.table.state.game_player_indexes.clone() {
            self.emit_player_state(idx);
        }

        self.continue_game()
    }

    /// Tell the seats who still holds chips
    fn refresh_has_chips(&mut self) {
        for player in &self.table.state.player_states {
            if let Err(err) = self
                .seats
                .update_player_has_chips(&player.player_id, player.bankroll > 0)
            {
                log::warn!(
                    "Table {}: player {} has no seat: {}",
                    self.table.id,
                    player.player_id,
                    err
                );
            }
        }
    }

    /// Reset per-hand state and schedule the next step
    fn continue_game(&mut self) -> TableResult<()> {
        let state = &mut self.table.state;
        state.game_player_indexes.clear();
        state.game_state = None;
        state.current_action_end_at = 0;
        for player in state.player_states.iter_mut() {
            player.positions.clear();
            player.is_participated = false;
            player.game_statistics = TablePlayerGameStatistics::default();
        }

        for redeem in std::mem::take(&mut self.pending_redeems) {
            if let Some(idx) = self.table.find_player_idx(&redeem.player_id) {
                self.table.state.player_states[idx].bankroll += redeem.redeem_chips;
                self.emit_player_state(idx);
            }
        }
        let mut leaving = std::mem::take(&mut self.pending_leaves);
        leaving.sort();
        leaving.dedup();
        leaving.retain(|id| self.table.find_player_idx(id).is_some());
        self.remove_players_or_report(&leaving);
        self.refresh_has_chips();

        let now = self.clock.now();
        if self.blinds.is_late_entry_closed(now) {
            let eliminated: Vec<String> = self
                .table
                .state
                .player_states
                .iter()
                .filter(|p| p.bankroll <= 0)
                .map(|p| p.player_id.clone())
                .collect();
            if !eliminated.is_empty() {
                log::info!(
                    "Table {}: {} players eliminated",
                    self.table.id,
                    eliminated.len()
                );
                self.remove_players_or_report(&eliminated);
            }
        }

        if self.is_time_up(now) {
            self.schedule_auto_game_open_end();
            if self.balance_requested {
                self.enter_balancing();
            }
            return Ok(());
        }

        if self.is_released || self.table.state.status == TableStatus::Closed {
            return Ok(());
        }

        if self.balance_requested {
            self.enter_balancing();
            return Ok(());
        }

        if self.should_pause() {
            self.pause();
        } else {
            self.schedule_next_game();
        }
        Ok(())
    }

    /// Whether the table reached its end: time cap, or a decided CT table
    fn is_time_up(&self, now: i64) -> bool {
        let meta = &self.table.meta;
        let timed = matches!(meta.mode, CompetitionMode::Ct | CompetitionMode::Cash)
            && meta.max_duration_secs > 0
            && now > self.table.state.start_at + meta.max_duration_secs;
        let decided = meta.mode == CompetitionMode::Ct
            && self.blinds.is_late_entry_closed(now)
            && self.table.alive_player_count() <= 1;
        timed || decided
    }

    /// Removal at settlement never blocks the next-hand decision
    fn remove_players_or_report(&mut self, player_ids: &[String]) {
        if let Err(err) = self.remove_players(player_ids) {
            log::error!(
                "Table {}: removing {} players failed: {}",
                self.table.id,
                player_ids.len(),
                err
            );
            self.emit_error(&err);
        }
    }

    fn schedule_auto_game_open_end(&mut self) {
        log::info!("Table {}: out of time, no more hands", self.table.id);
        self.pending_auto_end = true;
        let send = self.internal_sender();
        self.timebank.new_task(
            Duration::from_secs(self.options.end_game_delay_secs),
            move |cancelled| {
                if !cancelled {
                    send(TableAction::AutoGameOpenEnd);
                }
            },
        );
    }

    /// Fire the end-of-table callback if it is still owed
    ///
    /// Balance and close cancel the delay timer, so they flush it first.
    pub(super) fn flush_auto_game_open_end(&mut self) {
        if !self.pending_auto_end {
            return;
        }
        self.pending_auto_end = false;
        log::info!("Table {}: auto game open end", self.table.id);
        if let Some(f) = self.observers.auto_game_open_end.clone() {
            f(&self.table.meta.competition_id, &self.table.id);
        }
    }

    /// Break level, or too few players with chips
    pub(super) fn should_pause(&self) -> bool {
        self.blinds.is_breaking(self.clock.now())
            || self.table.alive_player_count() < self.table.meta.min_players
    }

    /// Pause; a break resumes by itself when it ends
    pub(super) fn pause(&mut self) {
        self.timebank.cancel();
        self.open_game_readies.stop();
        self.schedule_id += 1;
        self.set_status(TableStatus::Pausing);

        let now = self.clock.now();
        if self.blinds.is_breaking(now) {
            let end_at = self.blinds.current_level_end_at(now);
            let schedule_id = self.schedule_id;
            let send = self.internal_sender();
            log::info!("Table {}: breaking until {}", self.table.id, end_at);
            self.timebank.new_task_with_deadline(end_at, move |cancelled| {
                if !cancelled {
                    send(TableAction::BreakEnded { schedule_id });
                }
            });
        } else {
            log::info!("Table {}: waiting for players", self.table.id);
        }
    }

    pub(super) fn handle_break_ended(&mut self, schedule_id: u64) -> TableResult<()> {
        if schedule_id != self.schedule_id || self.table.state.status != TableStatus::Pausing {
            log::warn!("Table {}: stale break end", self.table.id);
            return Ok(());
        }
        self.open_or_pause()
    }

    /// Leave an insufficient-player pause once enough players are back
    pub(super) fn resume_if_possible(&mut self) {
        if self.table.state.status == TableStatus::Pausing && !self.should_pause() {
            log::info!("Table {}: enough players, resuming", self.table.id);
            self.schedule_next_game();
        }
    }

    /// Stand by until the interval elapsed and the seated players are ready
    fn schedule_next_game(&mut self) {
        self.set_status(TableStatus::GameStandby);
        self.schedule_id += 1;
        self.open_ready_done = false;
        self.open_interval_done = false;
        let schedule_id = self.schedule_id;

        self.open_game_readies.stop();
        self.open_game_readies.reset_participants();
        for player in self.table.state.player_states.iter().filter(|p| p.is_in) {
            self.open_game_readies.add(i64::from(player.seat), false);
        }
        let send = self.internal_sender();
        self.open_game_readies
            .on_completed(move || send(TableAction::OpenGameReadiesCompleted { schedule_id }));
        self.open_game_readies.start();

        let send = self.internal_sender();
        self.timebank.new_task(
            Duration::from_secs(self.options.interval_secs),
            move |cancelled| {
                if !cancelled {
                    send(TableAction::OpenGameIntervalElapsed { schedule_id });
                }
            },
        );
    }

    /// One of the two next-hand conditions is met; open once both are
    pub(super) fn handle_open_game_gate(
        &mut self,
        schedule_id: u64,
        readies: bool,
    ) -> TableResult<()> {
        if schedule_id != self.schedule_id {
            log::warn!("Table {}: stale open schedule {}", self.table.id, schedule_id);
            return Ok(());
        }

        if readies {
            self.open_ready_done = true;
        } else {
            self.open_interval_done = true;
        }
        if !(self.open_ready_done && self.open_interval_done) {
            return Ok(());
        }

        if matches!(
            self.table.state.status,
            TableStatus::GamePlaying | TableStatus::Balancing | TableStatus::Closed
        ) {
            log::debug!("Table {}: skipping auto open", self.table.id);
            return Ok(());
        }
        self.open_or_pause()
    }
}
