//! Hand opening: positions, participants and evaluator wiring.

use super::actor::TableActor;
use crate::{
    blind::BREAK_LEVEL,
    errors::{TableError, TableResult},
    game::{AdapterEvent, BlindOptions, DeckKind, GameAdapter, GameOptions, PlayerSetting, Position},
    table::{BlindState, Rule, TableStatus, UNSET_VALUE},
};

/// Position labels of `count` participants, dealer first
pub fn position_labels(rule: Rule, count: usize) -> Vec<Vec<Position>> {
    use Position::*;

    if rule == Rule::ShortDeck {
        return (0..count)
            .map(|i| if i == 0 { vec![Dealer] } else { vec![] })
            .collect();
    }

    let labels: &[Position] = match count {
        2 => return vec![vec![Dealer, Sb], vec![Bb]],
        3 => &[Dealer, Sb, Bb],
        4 => &[Dealer, Sb, Bb, Ug],
        5 => &[Dealer, Sb, Bb, Ug, Co],
        6 => &[Dealer, Sb, Bb, Ug, Ug1, Co],
        7 => &[Dealer, Sb, Bb, Ug, Ug1, Hj, Co],
        8 => &[Dealer, Sb, Bb, Ug, Ug1, Ug2, Hj, Co],
        _ => &[Dealer, Sb, Bb, Ug, Ug1, Ug2, Ug3, Hj, Co],
    };

    (0..count)
        .map(|i| labels.get(i).map(|p| vec![*p]).unwrap_or_default())
        .collect()
}

/// Evaluator options of a hand under `rule`
pub fn game_options(rule: Rule, blind: &BlindState, players: Vec<PlayerSetting>) -> GameOptions {
    let (deck, hole_cards_count, required_hole_cards_count) = match rule {
        Rule::Default => (DeckKind::Standard, 2, 0),
        Rule::ShortDeck => (DeckKind::ShortDeck, 2, 0),
        Rule::Omaha => (DeckKind::Standard, 4, 2),
    };

    GameOptions {
        deck,
        hole_cards_count,
        required_hole_cards_count,
        ante: blind.ante,
        blind: BlindOptions {
            dealer: blind.dealer,
            sb: blind.sb,
            bb: blind.bb,
        },
        players,
    }
}

impl TableActor {
    /// Open the next hand
    ///
    /// All-or-nothing: on failure the table and seats are restored to what
    /// they were before the call.
    pub(super) fn table_game_open(&mut self) -> TableResult<()> {
        if matches!(
            self.table.state.status,
            TableStatus::GameOpened | TableStatus::GamePlaying | TableStatus::Closed
        ) || self.table.state.start_at == i64::from(UNSET_VALUE)
        {
            return Err(TableError::TableOpenGameFailed);
        }

        let now = self.clock.now();
        let blind_state = self.blinds.current(now);
        if blind_state.level == BREAK_LEVEL {
            return Err(TableError::TableOpenGameFailedInBlindBreakingLevel);
        }

        let table_backup = self.table.clone();
        let seats_backup = self.seats.clone();

        let events = match self.open_game(blind_state) {
            Ok(events) => events,
            Err(err) => {
                log::debug!("Table {}: open failed: {}", self.table.id, err);
                self.table = table_backup;
                self.seats = seats_backup;
                self.game = None;
                return Err(err);
            }
        };

        log::info!(
            "Table {}: hand {} opened with {} players",
            self.table.id,
            self.table.state.game_count,
            self.table.state.game_player_indexes.len()
        );
        self.set_status(TableStatus::GamePlaying);
        self.emit_table_updated("TableGameOpen", vec![]);
        self.apply_game_events(events)
    }

    /// Open a hand, pausing instead when there are not enough players or blinds break
    pub(super) fn open_or_pause(&mut self) -> TableResult<()> {
        match self.table_game_open() {
            Ok(()) => Ok(()),
            Err(TableError::TableOpenGameFailed)
            | Err(TableError::TableOpenGameFailedInBlindBreakingLevel)
                if self.table.state.status != TableStatus::Closed =>
            {
                self.pause();
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn open_game(&mut self, blind_state: BlindState) -> TableResult<Vec<AdapterEvent>> {
        self.table.state.status = TableStatus::GameOpened;
        self.table.state.blind_state = blind_state;

        let positioned = if self.seats.is_init_positions() {
            self.seats.rotate_positions()
        } else {
            self.seats.init_positions(true)
        };
        if let Err(err) = positioned {
            log::debug!("Table {}: no positions for next hand: {}", self.table.id, err);
            return Err(TableError::TableOpenGameFailed);
        }

        for player in self.table.state.player_states.iter_mut() {
            player.is_participated = self.seats.is_player_active(&player.player_id);
            player.is_between_dealer_bb = self.seats.is_player_between_dealer_bb(&player.player_id);
            player.positions.clear();
        }

        let indexes: Vec<usize> = self
            .seats
            .participant_seats()
            .into_iter()
            .filter_map(|seat| self.table.state.seat_map.get(seat).copied())
            .filter(|idx| *idx != UNSET_VALUE)
            .map(|idx| idx as usize)
            .collect();
        if indexes.len() < self.table.meta.min_players {
            return Err(TableError::TableOpenGameFailed);
        }

        let labels = position_labels(self.table.meta.rule, indexes.len());
        let mut settings = Vec::with_capacity(indexes.len());
        for (idx, positions) in indexes.iter().zip(labels) {
            let player = &mut self.table.state.player_states[*idx];
            player.positions = positions.clone();
            settings.push(PlayerSetting {
                bankroll: player.bankroll,
                positions,
            });
        }

        let state = &mut self.table.state;
        state.game_player_indexes = indexes;
        state.game_count += 1;
        state.current_dealer_seat = seat_or_unset(self.seats.current_dealer_seat_id());
        state.current_sb_seat = seat_or_unset(self.seats.current_sb_seat_id());
        state.current_bb_seat = seat_or_unset(self.seats.current_bb_seat_id());
        state.game_blind_state = blind_state;

        let options = game_options(self.table.meta.rule, &blind_state, settings);
        let mut game = GameAdapter::new(self.factory.create(options)?);
        let events = game.start()?;
        self.game = Some(game);
        Ok(events)
    }
}

fn seat_or_unset(seat: Option<usize>) -> i32 {
    seat.map(|s| s as i32).unwrap_or(UNSET_VALUE)
}
