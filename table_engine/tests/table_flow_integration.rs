//! End-to-end table scenarios
//!
//! Every test drives a real table worker through the public async API. Time
//! is paused, so the 1 second ready timeouts elapse as soon as the runtime
//! is idle; unix time comes from a `ManualClock` the tests move by hand.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use table_engine::{
    BlindLevel, BlindSetting, CompetitionMode, EngineOptions, HoldemFactory, JoinPlayer,
    ManualClock, PlayerGameAction, Rule, Table, TableEngine, TableError, TableMeta,
    TablePlayerState, TableSetting, TableStatus,
    game::{ActionKind, GameEvent, GameRound, Position, cards::parse_cards},
};
use tokio::sync::mpsc::UnboundedReceiver;

const START: i64 = 1_700_000_000;
const PLAYERS: [&str; 3] = ["p1", "p2", "p3"];

// ============================================================================
// Helpers
// ============================================================================

fn setting(mode: CompetitionMode, buy_in: i64, levels: Vec<BlindLevel>) -> TableSetting {
    TableSetting {
        table_id: "table-1".to_string(),
        meta: TableMeta {
            competition_id: "comp-1".to_string(),
            rule: Rule::Default,
            mode,
            max_duration_secs: 0,
            max_seats: 9,
            min_players: 2,
            min_chip_unit: 10,
            action_time_secs: 10,
        },
        blind: BlindSetting {
            levels,
            initial_level: 1,
            final_buy_in_level: 1,
        },
        join_players: PLAYERS
            .iter()
            .map(|id| JoinPlayer::new(*id, buy_in))
            .collect(),
    }
}

fn default_levels() -> Vec<BlindLevel> {
    vec![BlindLevel::new(1, 10, 20, 600)]
}

/// Dealer (first in hand order) always gets trip aces
fn stacked_factory() -> Arc<HoldemFactory> {
    let deck = parse_cards("As Ah 2c 7d 3c 8d Ac Kd 9s 4h 5c").unwrap();
    Arc::new(HoldemFactory::with_deck(deck))
}

fn engine(factory: Arc<HoldemFactory>, clock: Arc<ManualClock>) -> TableEngine {
    TableEngine::new(EngineOptions::default(), factory).with_clock(clock)
}

async fn create_and_join(engine: &mut TableEngine, setting: TableSetting) -> Table {
    let players: Vec<String> = setting
        .join_players
        .iter()
        .map(|p| p.player_id.clone())
        .collect();
    engine.create_table(setting).unwrap();

    let mut table = None;
    for player_id in &players {
        table = Some(engine.player_join(player_id).await.unwrap());
    }
    table.unwrap()
}

/// Poll the table until `cond` holds
async fn wait_for(engine: &TableEngine, what: &str, cond: impl Fn(&Table) -> bool) -> Table {
    for _ in 0..600 {
        let table = engine.table().await.unwrap();
        if cond(&table) {
            return table;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {what}");
}

fn current_event(table: &Table) -> Option<GameEvent> {
    table.state.game_state.as_ref().map(|gs| gs.current_event())
}

fn current_round(table: &Table) -> Option<GameRound> {
    table.state.game_state.as_ref().map(|gs| gs.status.current_round)
}

/// Wait until somebody has to act in `round`
async fn wait_for_action(engine: &TableEngine, round: GameRound) -> Table {
    wait_for(engine, round.name(), |t| {
        current_event(t) == Some(GameEvent::RoundPrepared) && current_round(t) == Some(round)
    })
    .await
}

/// Player ID of the current actor
fn actor(table: &Table) -> String {
    let gs = table.state.game_state.as_ref().unwrap();
    let idx = table.state.game_player_indexes[gs.status.current_player];
    table.state.player_states[idx].player_id.clone()
}

fn role(table: &Table, position: Position) -> String {
    table
        .state
        .player_states
        .iter()
        .find(|p| p.positions.contains(&position))
        .map(|p| p.player_id.clone())
        .unwrap()
}

fn bankroll(table: &Table, player_id: &str) -> i64 {
    let idx = table.find_player_idx(player_id).unwrap();
    table.state.player_states[idx].bankroll
}

/// Bankroll inside the running hand
fn game_bankroll(table: &Table, player_id: &str) -> i64 {
    let idx = table.game_player_index(player_id).unwrap();
    table.state.game_state.as_ref().unwrap().players[idx].bankroll
}

fn total_bankroll(table: &Table) -> i64 {
    table.state.player_states.iter().map(|p| p.bankroll).sum()
}

fn assert_seat_map_consistent(table: &Table) {
    for (idx, player) in table.state.player_states.iter().enumerate() {
        assert_eq!(table.state.seat_map[player.seat as usize], idx as i32);
    }
    for (seat, idx) in table.state.seat_map.iter().enumerate() {
        if *idx >= 0 {
            assert_eq!(table.state.player_states[*idx as usize].seat, seat as i32);
        }
    }
}

/// Dealer, SB and BB of the preflop action
struct Roles {
    dealer: String,
    sb: String,
    bb: String,
}

async fn start_three_handed(engine: &TableEngine) -> (Table, Roles) {
    let started = engine.start_table_game().await.unwrap();
    assert_eq!(started.state.status, TableStatus::GamePlaying);
    assert_eq!(started.state.game_count, 1);

    let table = wait_for_action(engine, GameRound::Preflop).await;
    let roles = Roles {
        dealer: role(&table, Position::Dealer),
        sb: role(&table, Position::Sb),
        bb: role(&table, Position::Bb),
    };
    (table, roles)
}

/// Preflop: dealer calls, SB calls, BB checks
async fn limp_preflop(engine: &TableEngine, roles: &Roles) -> Table {
    let table = wait_for_action(engine, GameRound::Preflop).await;
    assert_eq!(actor(&table), roles.dealer);
    let table = engine.player_call(&roles.dealer).await.unwrap();
    assert_eq!(actor(&table), roles.sb);
    let table = engine.player_call(&roles.sb).await.unwrap();
    assert_eq!(actor(&table), roles.bb);
    engine.player_check(&roles.bb).await.unwrap()
}

/// Fold every actor until the hand is over
async fn fold_out(engine: &TableEngine) -> Table {
    let mut table = wait_for_action(engine, GameRound::Preflop).await;
    while table.state.game_state.is_some() {
        table = engine.player_fold(&actor(&table)).await.unwrap();
    }
    table
}

/// Everybody still in checks through `rounds`; returns the last reply
async fn check_down(engine: &TableEngine, rounds: &[GameRound]) -> Table {
    let mut last = None;
    for round in rounds {
        let mut table = wait_for_action(engine, *round).await;
        loop {
            let before = current_round(&table);
            table = engine.player_check(&actor(&table)).await.unwrap();
            if current_event(&table) != Some(GameEvent::RoundPrepared)
                || current_round(&table) != before
            {
                break;
            }
        }
        last = Some(table);
    }
    last.unwrap()
}

fn player(table: &Table, player_id: &str) -> TablePlayerState {
    let idx = table.find_player_idx(player_id).unwrap();
    table.state.player_states[idx].clone()
}

// ============================================================================
// Hand scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_preflop_walk_then_next_hand() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;

    let (table, roles) = start_three_handed(&engine).await;
    assert_eq!(table.state.game_player_indexes.len(), 3);
    assert_eq!(game_bankroll(&table, &roles.sb), 14990);
    assert_eq!(game_bankroll(&table, &roles.bb), 14980);
    assert_eq!(bankroll(&table, &roles.bb), 15000);
    assert!(table.state.current_action_end_at > 0);

    assert_eq!(actor(&table), roles.dealer);
    let table = engine.player_fold(&roles.dealer).await.unwrap();
    assert_eq!(actor(&table), roles.sb);
    let table = engine.player_fold(&roles.sb).await.unwrap();

    assert_eq!(table.state.status, TableStatus::GameStandby);
    assert_eq!(table.state.game_count, 1);
    assert_eq!(bankroll(&table, &roles.dealer), 15000);
    assert_eq!(bankroll(&table, &roles.sb), 14990);
    assert_eq!(bankroll(&table, &roles.bb), 15010);
    assert!(table.state.game_state.is_none());
    assert!(table.state.game_player_indexes.is_empty());

    let table = wait_for(&engine, "second hand", |t| t.state.game_count == 2).await;
    assert_eq!(table.state.status, TableStatus::GamePlaying);
    assert_eq!(total_bankroll(&table), 45000);
}

#[tokio::test(start_paused = true)]
async fn test_river_showdown_conserves_chips() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;

    let (_, roles) = start_three_handed(&engine).await;
    limp_preflop(&engine, &roles).await;

    let mut last = None;
    for round in [GameRound::Flop, GameRound::Turn, GameRound::River] {
        let table = wait_for_action(&engine, round).await;
        assert_eq!(actor(&table), roles.sb);
        engine.player_bet(&roles.sb, 10).await.unwrap();
        engine.player_call(&roles.bb).await.unwrap();
        last = Some(engine.player_call(&roles.dealer).await.unwrap());
    }

    let table = last.unwrap();
    assert_eq!(table.state.game_count, 1);
    assert_eq!(total_bankroll(&table), 45000);
    assert_eq!(bankroll(&table, &roles.dealer), 15100);
    assert_eq!(bankroll(&table, &roles.sb), 14950);
    assert_eq!(bankroll(&table, &roles.bb), 14950);
}

#[tokio::test(start_paused = true)]
async fn test_flop_allin_busts_losers_and_pauses() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 150, default_levels())).await;

    let (_, roles) = start_three_handed(&engine).await;
    limp_preflop(&engine, &roles).await;

    let table = wait_for_action(&engine, GameRound::Flop).await;
    assert_eq!(actor(&table), roles.sb);
    engine.player_allin(&roles.sb).await.unwrap();
    engine.player_allin(&roles.bb).await.unwrap();
    let table = engine.player_allin(&roles.dealer).await.unwrap();

    assert_eq!(bankroll(&table, &roles.dealer), 450);
    assert_eq!(bankroll(&table, &roles.sb), 0);
    assert_eq!(bankroll(&table, &roles.bb), 0);

    // Late entry is still open: busted players keep their seats
    assert_eq!(table.state.player_states.len(), 3);
    assert_eq!(table.state.status, TableStatus::Pausing);

    // A re-buy brings the table back
    let table = engine
        .player_redeem_chips(JoinPlayer::new(roles.sb.clone(), 500))
        .await
        .unwrap();
    assert_eq!(bankroll(&table, &roles.sb), 500);
    assert_eq!(table.state.status, TableStatus::GameStandby);

    let table = wait_for(&engine, "hand after re-buy", |t| t.state.game_count == 2).await;
    assert_eq!(table.state.game_player_indexes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_heads_up_dealer_alternates() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let mut setting = setting(CompetitionMode::Cash, 1000, default_levels());
    setting.join_players = vec![
        JoinPlayer::new("p1", 1000).with_seat(0),
        JoinPlayer::new("p2", 1000).with_seat(3),
    ];
    create_and_join(&mut engine, setting).await;

    engine.start_table_game().await.unwrap();
    let table = wait_for_action(&engine, GameRound::Preflop).await;
    let first_dealer = table.state.current_dealer_seat;
    assert_eq!(table.state.current_sb_seat, first_dealer);
    assert_ne!(table.state.current_bb_seat, first_dealer);

    // Heads-up the dealer acts first preflop
    let dealer = role(&table, Position::Dealer);
    assert_eq!(actor(&table), dealer);
    engine.player_fold(&dealer).await.unwrap();

    wait_for(&engine, "second hand", |t| t.state.game_count == 2).await;
    let table = wait_for_action(&engine, GameRound::Preflop).await;
    assert_ne!(table.state.current_dealer_seat, first_dealer);
    assert_eq!(table.state.current_bb_seat, first_dealer);
}

#[tokio::test(start_paused = true)]
async fn test_time_expiry_ends_auto_open() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock.clone());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    engine.on_auto_game_open_end(move |competition_id, table_id| {
        let _ = tx.send((competition_id.to_string(), table_id.to_string()));
    });

    let mut setting = setting(CompetitionMode::Ct, 15000, default_levels());
    setting.meta.max_duration_secs = 60;
    create_and_join(&mut engine, setting).await;

    let (_, roles) = start_three_handed(&engine).await;
    clock.advance_secs(61);
    engine.player_fold(&roles.dealer).await.unwrap();
    let table = engine.player_fold(&roles.sb).await.unwrap();
    assert_eq!(table.state.status, TableStatus::GameSettled);

    let (competition_id, table_id) = rx.recv().await.unwrap();
    assert_eq!(competition_id, "comp-1");
    assert_eq!(table_id, "table-1");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let table = engine.table().await.unwrap();
    assert_eq!(table.state.game_count, 1);

    let table = engine.balance_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Balancing);
    let table = engine.delete_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_antes_collected_before_blinds() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let levels = vec![BlindLevel::new(1, 10, 20, 600).with_ante(5)];
    create_and_join(&mut engine, setting(CompetitionMode::Mtt, 1000, levels)).await;

    let started = engine.start_table_game().await.unwrap();
    assert_eq!(started.state.game_blind_state.ante, 5);

    let table = wait_for(&engine, "ante phase", |t| {
        current_event(t) == Some(GameEvent::Prepared)
    })
    .await;
    let first = table.state.player_states[table.state.game_player_indexes[1]]
        .player_id
        .clone();
    let table = engine.player_pay(&first, 5).await.unwrap();
    assert_eq!(game_bankroll(&table, &first), 995);

    // Paying twice is rejected by the evaluator
    assert!(engine.player_pay(&first, 5).await.is_err());

    let table = wait_for_action(&engine, GameRound::Preflop).await;
    let dealer = role(&table, Position::Dealer);
    let sb = role(&table, Position::Sb);
    let bb = role(&table, Position::Bb);
    assert_eq!(game_bankroll(&table, &dealer), 995);
    assert_eq!(game_bankroll(&table, &sb), 985);
    assert_eq!(game_bankroll(&table, &bb), 975);
}

#[tokio::test(start_paused = true)]
async fn test_ante_actions_reported_once_per_player() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let actions = Arc::new(Mutex::new(Vec::<PlayerGameAction>::new()));
    let sink = actions.clone();
    engine.on_game_player_action_updated(move |action| sink.lock().unwrap().push(action.clone()));
    let levels = vec![BlindLevel::new(1, 10, 20, 600).with_ante(5)];
    create_and_join(&mut engine, setting(CompetitionMode::Mtt, 1000, levels)).await;

    engine.start_table_game().await.unwrap();
    let table = wait_for(&engine, "ante phase", |t| {
        current_event(t) == Some(GameEvent::Prepared)
    })
    .await;
    let first = table.state.player_states[table.state.game_player_indexes[1]]
        .player_id
        .clone();
    engine.player_pay(&first, 5).await.unwrap();
    wait_for_action(&engine, GameRound::Preflop).await;

    let antes: Vec<PlayerGameAction> = actions
        .lock()
        .unwrap()
        .iter()
        .filter(|a| a.round == "ante")
        .cloned()
        .collect();
    assert_eq!(antes.len(), 3);
    assert_eq!(antes[0].player_id, first);
    assert!(antes.iter().all(|a| a.action == ActionKind::Pay && a.chips == 5));

    let mut payers: Vec<&str> = antes.iter().map(|a| a.player_id.as_str()).collect();
    payers.sort();
    payers.dedup();
    assert_eq!(payers.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_blind_confirmation_needs_big_blind_amount() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;

    engine.start_table_game().await.unwrap();
    let table = wait_for(&engine, "initialised preflop", |t| {
        current_event(t) == Some(GameEvent::RoundInitialized)
            && current_round(t) == Some(GameRound::Preflop)
    })
    .await;
    let sb = role(&table, Position::Sb);
    let bb = role(&table, Position::Bb);

    let err = engine.player_pay(&sb, 10).await.unwrap_err();
    assert_eq!(err, TableError::InvalidPayAnteAction);
    engine.player_pay(&bb, 20).await.unwrap();

    let table = wait_for_action(&engine, GameRound::Preflop).await;
    assert_eq!(actor(&table), role(&table, Position::Dealer));
    assert_eq!(game_bankroll(&table, &sb), 14990);
    assert_eq!(game_bankroll(&table, &bb), 14980);
}

// ============================================================================
// Rule variants
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_short_deck_hand_takes_antes_without_blinds() {
    let clock = Arc::new(ManualClock::new(START));
    // Dealer holds trip aces; the others pair sixes or miss
    let deck = parse_cards("As Ah 6c 7d 8c 9d Ac Kd Qs Jh 6h").unwrap();
    let mut engine = engine(Arc::new(HoldemFactory::with_deck(deck)), clock);
    let levels = vec![BlindLevel::new(1, 10, 20, 600).with_ante(10).with_dealer_times(2)];
    let mut setting = setting(CompetitionMode::Mtt, 1000, levels);
    setting.meta.rule = Rule::ShortDeck;
    create_and_join(&mut engine, setting).await;

    let started = engine.start_table_game().await.unwrap();
    assert_eq!(started.state.current_sb_seat, -1);
    assert_eq!(started.state.current_bb_seat, -1);

    let table = wait_for_action(&engine, GameRound::Preflop).await;
    let dealer = role(&table, Position::Dealer);
    assert!(table.state.player_states.iter().all(|p| {
        !p.positions.contains(&Position::Sb) && !p.positions.contains(&Position::Bb)
    }));
    assert_eq!(game_bankroll(&table, &dealer), 980);
    for player in PLAYERS.iter().filter(|id| **id != dealer) {
        assert_eq!(game_bankroll(&table, player), 990);
    }

    let rounds = [GameRound::Preflop, GameRound::Flop, GameRound::Turn, GameRound::River];
    let table = check_down(&engine, &rounds).await;
    assert!(table.state.game_state.is_none());
    assert_eq!(bankroll(&table, &dealer), 1020);
    for player in PLAYERS.iter().filter(|id| **id != dealer) {
        assert_eq!(bankroll(&table, player), 990);
    }
    assert_eq!(total_bankroll(&table), 3000);
}

#[tokio::test(start_paused = true)]
async fn test_omaha_hand_plays_four_hole_cards() {
    let clock = Arc::new(ManualClock::new(START));
    // Dealer makes trip aces; SB and BB only pair up
    let deck = parse_cards("As Ah Kc Kd 2c 3d 4h 5s 3c 3h 4c 4d Ac 7h 8s 9d 2h").unwrap();
    let mut engine = engine(Arc::new(HoldemFactory::with_deck(deck)), clock);
    let mut setting = setting(CompetitionMode::Ct, 1000, default_levels());
    setting.meta.rule = Rule::Omaha;
    create_and_join(&mut engine, setting).await;

    let (table, roles) = start_three_handed(&engine).await;
    let gs = table.state.game_state.as_ref().unwrap();
    assert_eq!(gs.meta.required_hole_cards_count, 2);
    assert!(gs.players.iter().all(|p| p.hole_cards.len() == 4));

    limp_preflop(&engine, &roles).await;
    let table = check_down(&engine, &[GameRound::Flop, GameRound::Turn, GameRound::River]).await;
    assert!(table.state.game_state.is_none());
    assert_eq!(bankroll(&table, &roles.dealer), 1040);
    assert_eq!(bankroll(&table, &roles.sb), 980);
    assert_eq!(bankroll(&table, &roles.bb), 980);
}

// ============================================================================
// Lifecycle and boundaries
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_with_one_player_pauses_until_join() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    engine
        .create_table(setting(CompetitionMode::Ct, 1000, default_levels()))
        .unwrap();
    engine.player_join("p1").await.unwrap();

    let table = engine.start_table_game().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Pausing);
    assert_eq!(table.state.start_at, START);

    // Not enough active players: nothing changes
    let before = engine.table().await.unwrap();
    let err = engine.table_game_open().await.unwrap_err();
    assert_eq!(err, TableError::TableOpenGameFailed);
    let after = engine.table().await.unwrap();
    assert_eq!(after.state, before.state);
    assert_eq!(after.state.game_count, 0);

    let table = engine.player_join("p2").await.unwrap();
    assert_eq!(table.state.status, TableStatus::GameStandby);
    let table = wait_for(&engine, "first hand", |t| t.state.game_count == 1).await;
    assert_eq!(table.state.game_player_indexes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_during_break_fails() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock.clone());
    let levels = vec![
        BlindLevel::new(1, 10, 20, 60),
        BlindLevel::break_level(60),
        BlindLevel::new(2, 20, 40, 600),
    ];
    engine
        .create_table(setting(CompetitionMode::Ct, 1000, levels))
        .unwrap();
    engine.player_join("p1").await.unwrap();
    engine.start_table_game().await.unwrap();

    clock.advance_secs(70);
    let err = engine.table_game_open().await.unwrap_err();
    assert_eq!(err, TableError::TableOpenGameFailedInBlindBreakingLevel);

    let table = engine.table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Pausing);
    assert_eq!(table.state.game_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reserve_boundaries() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let mut setting = setting(CompetitionMode::Cash, 1000, default_levels());
    setting.meta.max_seats = 3;
    engine.create_table(setting).unwrap();

    let err = engine
        .player_reserve(JoinPlayer::new("p4", 1000))
        .await
        .unwrap_err();
    assert_eq!(err, TableError::NoEmptySeats);

    let table = engine.players_leave(vec!["p3".to_string()]).await.unwrap();
    assert_eq!(table.state.player_states.len(), 2);
    assert_seat_map_consistent(&table);

    let err = engine
        .player_reserve(JoinPlayer::new("p1", 1000))
        .await
        .unwrap_err();
    assert_eq!(err, TableError::DuplicatePlayers);

    let err = engine
        .player_reserve(JoinPlayer::new("p4", 0))
        .await
        .unwrap_err();
    assert_eq!(err, TableError::InvalidChips(0));

    let err = engine
        .players_leave(vec!["p1".to_string(), "ghost".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err, TableError::PlayerNotFound);
    assert_eq!(engine.table().await.unwrap().state.player_states.len(), 2);

    let table = engine.player_reserve(JoinPlayer::new("p4", 1000)).await.unwrap();
    assert_eq!(table.state.player_states.len(), 3);
    assert_seat_map_consistent(&table);
}

#[tokio::test(start_paused = true)]
async fn test_leave_and_balance_wait_for_settlement() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Mtt, 15000, default_levels())).await;

    let (_, roles) = start_three_handed(&engine).await;

    let table = engine.players_leave(vec![roles.bb.clone()]).await.unwrap();
    assert!(table.find_player_idx(&roles.bb).is_some());
    let table = engine.balance_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::GamePlaying);

    engine.player_fold(&roles.dealer).await.unwrap();
    let table = engine.player_fold(&roles.sb).await.unwrap();

    assert!(table.find_player_idx(&roles.bb).is_none());
    assert_eq!(table.state.player_states.len(), 2);
    assert_eq!(table.state.status, TableStatus::Balancing);
    assert_seat_map_consistent(&table);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_turn_action_reports_error() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let errors = Arc::new(Mutex::new(vec![]));
    let sink = errors.clone();
    engine.on_error_updated(move |_, err| sink.lock().unwrap().push(err.clone()));
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;

    let (_, roles) = start_three_handed(&engine).await;
    let err = engine.player_check(&roles.bb).await.unwrap_err();
    assert_eq!(err, TableError::PlayerInvalidAction);

    let err = engine.player_call("ghost").await.unwrap_err();
    assert_eq!(err, TableError::PlayerNotFound);

    assert_eq!(
        *errors.lock().unwrap(),
        vec![TableError::PlayerInvalidAction, TableError::PlayerNotFound]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_table_rejects_commands() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 1000, default_levels())).await;

    let table = engine.close_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Closed);
    assert_eq!(engine.player_ready("p1").await.unwrap_err(), TableError::TableClosed);
    assert_eq!(engine.table().await.unwrap().state.status, TableStatus::Closed);

    engine.delete_table().await.unwrap();
    assert_eq!(engine.table().await.unwrap_err(), TableError::TableClosed);
}

#[tokio::test(start_paused = true)]
async fn test_update_serial_strictly_increases() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let serials = Arc::new(Mutex::new(vec![]));
    let sink = serials.clone();
    engine.on_table_updated(move |table, _| sink.lock().unwrap().push(table.update_serial));

    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;
    let (_, roles) = start_three_handed(&engine).await;
    engine.player_fold(&roles.dealer).await.unwrap();
    engine.player_fold(&roles.sb).await.unwrap();

    let serials = serials.lock().unwrap();
    assert!(serials.len() > 5);
    assert!(serials.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_table_json_round_trip_mid_hand() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, default_levels())).await;
    let (table, roles) = start_three_handed(&engine).await;

    let json = serde_json::to_string(&table).unwrap();
    assert!(json.contains("\"game_player_indexes\""));
    assert!(json.contains("\"round_prepared\""));

    let decoded: Table = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, table);
    assert_eq!(decoded.game_player_index(&roles.dealer), Some(0));
    assert_eq!(decoded.game_player_index(&roles.bb), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_leave_removes_player_once() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock);
    let errors = Arc::new(Mutex::new(vec![]));
    let sink = errors.clone();
    engine.on_error_updated(move |_, err| sink.lock().unwrap().push(err.clone()));
    create_and_join(&mut engine, setting(CompetitionMode::Mtt, 15000, default_levels())).await;

    let (_, roles) = start_three_handed(&engine).await;
    engine.players_leave(vec![roles.bb.clone()]).await.unwrap();
    engine
        .players_leave(vec![roles.bb.clone(), roles.bb.clone()])
        .await
        .unwrap();

    engine.player_fold(&roles.dealer).await.unwrap();
    let table = engine.player_fold(&roles.sb).await.unwrap();
    assert!(table.find_player_idx(&roles.bb).is_none());
    assert_eq!(table.state.player_states.len(), 2);
    assert_eq!(table.state.status, TableStatus::GameStandby);
    assert_seat_map_consistent(&table);
    assert!(errors.lock().unwrap().is_empty());

    let table = wait_for(&engine, "heads-up hand", |t| t.state.game_count == 2).await;
    assert_eq!(table.state.game_player_indexes.len(), 2);
}

/// CT table capped at 60 seconds, reporting the end-of-table callback
async fn timed_table(clock: Arc<ManualClock>) -> (TableEngine, UnboundedReceiver<(String, String)>) {
    let mut engine = engine(stacked_factory(), clock);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    engine.on_auto_game_open_end(move |competition_id, table_id| {
        let _ = tx.send((competition_id.to_string(), table_id.to_string()));
    });

    let mut setting = setting(CompetitionMode::Ct, 15000, default_levels());
    setting.meta.max_duration_secs = 60;
    create_and_join(&mut engine, setting).await;
    (engine, rx)
}

#[tokio::test(start_paused = true)]
async fn test_balance_right_after_time_up_still_reports_end() {
    let clock = Arc::new(ManualClock::new(START));
    let (engine, mut rx) = timed_table(clock.clone()).await;

    let (_, roles) = start_three_handed(&engine).await;
    clock.advance_secs(61);
    engine.player_fold(&roles.dealer).await.unwrap();
    engine.player_fold(&roles.sb).await.unwrap();

    let table = engine.balance_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Balancing);
    assert_eq!(
        rx.try_recv().unwrap(),
        ("comp-1".to_string(), "table-1".to_string())
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_right_after_time_up_still_reports_end() {
    let clock = Arc::new(ManualClock::new(START));
    let (engine, mut rx) = timed_table(clock.clone()).await;

    let (_, roles) = start_three_handed(&engine).await;
    clock.advance_secs(61);
    engine.player_fold(&roles.dealer).await.unwrap();
    engine.player_fold(&roles.sb).await.unwrap();

    let table = engine.close_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::Closed);
    assert!(rx.try_recv().is_ok());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_deferred_balance_survives_time_up() {
    let clock = Arc::new(ManualClock::new(START));
    let (engine, mut rx) = timed_table(clock.clone()).await;

    let (_, roles) = start_three_handed(&engine).await;
    let table = engine.balance_table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::GamePlaying);

    clock.advance_secs(61);
    engine.player_fold(&roles.dealer).await.unwrap();
    let table = engine.player_fold(&roles.sb).await.unwrap();
    assert_eq!(table.state.status, TableStatus::Balancing);
    assert_eq!(table.state.game_count, 1);
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_break_end_resumes_play() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(stacked_factory(), clock.clone());
    let levels = vec![
        BlindLevel::new(1, 10, 20, 60),
        BlindLevel::break_level(60),
        BlindLevel::new(2, 20, 40, 600),
    ];
    create_and_join(&mut engine, setting(CompetitionMode::Ct, 15000, levels)).await;

    start_three_handed(&engine).await;
    clock.advance_secs(70);
    let table = fold_out(&engine).await;
    assert_eq!(table.state.status, TableStatus::Pausing);

    // The break runs until START + 120
    clock.advance_secs(55);
    let table = wait_for(&engine, "hand after the break", |t| t.state.game_count == 2).await;
    assert_eq!(table.state.game_blind_state.level, 2);
    assert_eq!(table.state.game_blind_state.bb, 40);
}

#[tokio::test(start_paused = true)]
async fn test_next_hand_waits_for_open_readies() {
    let clock = Arc::new(ManualClock::new(START));
    let options = EngineOptions {
        interval_secs: 0,
        ready_timeout_secs: 1,
        open_game_timeout_secs: 30,
        end_game_delay_secs: 1,
    };
    let mut engine =
        TableEngine::new(options, Arc::new(HoldemFactory::with_seed(7))).with_clock(clock);
    create_and_join(&mut engine, setting(CompetitionMode::Cash, 15000, default_levels())).await;

    // Nothing to acknowledge before the table starts
    let err = engine.player_ready("p1").await.unwrap_err();
    assert_eq!(err, TableError::InvalidReadyAction);

    start_three_handed(&engine).await;
    let table = fold_out(&engine).await;
    assert_eq!(table.state.status, TableStatus::GameStandby);

    // A player joining now has to acknowledge too
    engine.player_reserve(JoinPlayer::new("p4", 15000)).await.unwrap();
    engine.player_join("p4").await.unwrap();

    let waiting_since = tokio::time::Instant::now();
    for player_id in PLAYERS {
        engine.player_ready(player_id).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    let table = engine.table().await.unwrap();
    assert_eq!(table.state.status, TableStatus::GameStandby);
    assert_eq!(table.state.game_count, 1);

    engine.player_ready("p4").await.unwrap();
    wait_for(&engine, "second hand", |t| t.state.game_count == 2).await;
    assert!(waiting_since.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_late_entry_sits_out_until_button_passes() {
    let clock = Arc::new(ManualClock::new(START));
    let mut engine = engine(Arc::new(HoldemFactory::with_seed(7)), clock);
    let mut setting = setting(CompetitionMode::Ct, 15000, default_levels());
    setting.join_players = vec![
        JoinPlayer::new("p1", 15000).with_seat(0),
        JoinPlayer::new("p2", 15000).with_seat(3),
        JoinPlayer::new("p3", 15000).with_seat(6),
    ];
    create_and_join(&mut engine, setting).await;

    let (table, _) = start_three_handed(&engine).await;
    // One seat past the SB lies strictly between the dealer and the BB
    let late_seat = (table.state.current_sb_seat + 1) as usize;
    let table = engine
        .player_reserve(JoinPlayer::new("p4", 15000).with_seat(late_seat))
        .await
        .unwrap();
    assert!(player(&table, "p4").is_between_dealer_bb);
    engine.player_join("p4").await.unwrap();

    fold_out(&engine).await;
    wait_for(&engine, "second hand", |t| t.state.game_count == 2).await;
    let table = wait_for_action(&engine, GameRound::Preflop).await;
    let late = player(&table, "p4");
    assert!(late.is_between_dealer_bb);
    assert!(!late.is_participated);
    assert!(table.game_player_index("p4").is_none());
    assert_eq!(table.state.game_player_indexes.len(), 3);

    fold_out(&engine).await;
    wait_for(&engine, "third hand", |t| t.state.game_count == 3).await;
    let table = wait_for_action(&engine, GameRound::Preflop).await;
    let late = player(&table, "p4");
    assert!(!late.is_between_dealer_bb);
    assert!(late.is_participated);
    assert_eq!(table.state.game_player_indexes.len(), 4);
}
