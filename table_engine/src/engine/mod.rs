//! Table engine: one worker per table behind an async verb API.
//!
//! [`TableEngine`] validates what it can up front, then turns every call
//! into a [`TableAction`] on the table's command channel. The
//! [`TableActor`] worker applies commands one at a time, drives the hand
//! evaluator and reports through the registered observers.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use table_engine::{EngineOptions, HoldemFactory, TableEngine};
//!
//! let mut engine = TableEngine::new(EngineOptions::default(), Arc::new(HoldemFactory::new()));
//! engine.on_table_updated(|table, event| println!("{} {}", table.id, event.name));
//! let table = engine.create_table(setting)?;
//! engine.player_join("p1").await?;
//! engine.start_table_game().await?;
//! ```

pub mod actor;
pub mod events;
pub mod messages;
pub mod opener;
mod play;
mod settlement;

pub use actor::TableActor;
pub use events::{PlayerGameAction, TableStateEvent, UpdateEvent};
pub use messages::{Request, TableAction};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::{
    blind::BlindSchedule,
    clock::{Clock, SystemClock},
    config::{EngineOptions, TableSetting},
    errors::{TableError, TableResult},
    game::GameFactory,
    table::{JoinPlayer, Table, TablePlayerState},
};
use events::Observers;

/// Handle on one table
///
/// Register observers first; [`TableEngine::create_table`] hands them to
/// the worker it spawns.
pub struct TableEngine {
    options: EngineOptions,
    factory: Arc<dyn GameFactory>,
    clock: Arc<dyn Clock>,
    observers: Observers,
    sender: Option<mpsc::UnboundedSender<Request>>,
    table_id: String,
}

impl TableEngine {
    /// Create an engine without a table
    pub fn new(options: EngineOptions, factory: Arc<dyn GameFactory>) -> Self {
        Self {
            options,
            factory,
            clock: Arc::new(SystemClock),
            observers: Observers::default(),
            sender: None,
            table_id: String::new(),
        }
    }

    /// Use `clock` for unix time (blind levels, deadlines, time caps)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// ID of the table, empty before [`TableEngine::create_table`]
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    // ===== Observers =====

    pub fn on_table_updated<F>(&mut self, f: F)
    where
        F: Fn(&Table, &UpdateEvent) + Send + Sync + 'static,
    {
        self.observers.table_updated = Some(Arc::new(f));
    }

    /// Errors raised on the worker, including failed commands
    pub fn on_error_updated<F>(&mut self, f: F)
    where
        F: Fn(&Table, &TableError) + Send + Sync + 'static,
    {
        self.observers.error_updated = Some(Arc::new(f));
    }

    pub fn on_table_state_updated<F>(&mut self, f: F)
    where
        F: Fn(TableStateEvent, &Table) + Send + Sync + 'static,
    {
        self.observers.table_state_updated = Some(Arc::new(f));
    }

    /// Called with `(competition_id, table_id, player)`
    pub fn on_table_player_state_updated<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, &TablePlayerState) + Send + Sync + 'static,
    {
        self.observers.table_player_state_updated = Some(Arc::new(f));
    }

    /// Called with `(competition_id, table_id, player)` for every reservation
    pub fn on_table_player_reserved<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, &TablePlayerState) + Send + Sync + 'static,
    {
        self.observers.table_player_reserved = Some(Arc::new(f));
    }

    pub fn on_game_player_action_updated<F>(&mut self, f: F)
    where
        F: Fn(&PlayerGameAction) + Send + Sync + 'static,
    {
        self.observers.game_player_action_updated = Some(Arc::new(f));
    }

    /// Called once, right before the first hand is opened
    pub fn on_ready_open_first_table_game<F>(&mut self, f: F)
    where
        F: Fn(&Table) + Send + Sync + 'static,
    {
        self.observers.ready_open_first_table_game = Some(Arc::new(f));
    }

    /// Called with `(competition_id, table_id)` once the table stops opening hands
    pub fn on_auto_game_open_end<F>(&mut self, f: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.observers.auto_game_open_end = Some(Arc::new(f));
    }

    // ===== Table lifecycle =====

    /// Create the table and spawn its worker
    ///
    /// Players listed in `setting.join_players` are reserved (not joined).
    /// Must be called inside a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Table` - The created table
    pub fn create_table(&mut self, setting: TableSetting) -> TableResult<Table> {
        if self.sender.is_some() {
            return Err(TableError::InvalidCreateTableSetting(
                "table already created".to_string(),
            ));
        }
        self.options
            .validate()
            .map_err(TableError::InvalidCreateTableSetting)?;
        setting
            .validate()
            .map_err(TableError::InvalidCreateTableSetting)?;

        let table_id = if setting.table_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            setting.table_id.clone()
        };
        let table = Table::new(&table_id, setting.meta.clone());
        let blinds = BlindSchedule::new(&setting.blind);

        let (sender, inbox) = mpsc::unbounded_channel();
        let mut actor = TableActor::new(
            table,
            blinds,
            self.options.clone(),
            self.clock.clone(),
            self.factory.clone(),
            self.observers.clone(),
            inbox,
            sender.downgrade(),
        );
        actor.handle_batch_reserve(setting.join_players)?;
        actor.emit_table_updated("CreateTable", vec![]);
        let table = actor.table.clone();

        log::info!("Table {}: created", table_id);
        tokio::spawn(actor.run());

        self.sender = Some(sender);
        self.table_id = table_id;
        Ok(table)
    }

    /// Snapshot of the table
    pub async fn table(&self) -> TableResult<Table> {
        self.request(TableAction::GetTable).await
    }

    /// Stop opening hands and release timers; queries keep working
    pub async fn close_table(&self) -> TableResult<Table> {
        self.request(TableAction::CloseTable).await
    }

    /// Move the table to balancing, after the running hand if there is one
    pub async fn balance_table(&self) -> TableResult<Table> {
        self.request(TableAction::BalanceTable).await
    }

    /// Start the blind clock and open the first hand
    pub async fn start_table_game(&self) -> TableResult<Table> {
        self.request(TableAction::StartTableGame).await
    }

    /// Open the next hand now
    pub async fn table_game_open(&self) -> TableResult<Table> {
        self.request(TableAction::TableGameOpen).await
    }

    /// Close the table and stop its worker
    pub async fn delete_table(&self) -> TableResult<Table> {
        self.request(TableAction::DeleteTable).await
    }

    // ===== Membership =====

    pub async fn player_reserve(&self, player: JoinPlayer) -> TableResult<Table> {
        self.request(TableAction::PlayerReserve(player)).await
    }

    /// Reserve several players at once, all or none
    pub async fn players_batch_reserve(&self, players: Vec<JoinPlayer>) -> TableResult<Table> {
        self.request(TableAction::PlayersBatchReserve(players)).await
    }

    /// Take a reserved seat
    pub async fn player_join(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerJoin {
            player_id: player_id.to_string(),
        })
        .await
    }

    /// Add chips to a seated player
    pub async fn player_redeem_chips(&self, player: JoinPlayer) -> TableResult<Table> {
        self.request(TableAction::PlayerRedeemChips(player)).await
    }

    pub async fn players_leave(&self, player_ids: Vec<String>) -> TableResult<Table> {
        self.request(TableAction::PlayersLeave(player_ids)).await
    }

    // ===== Per-hand actions =====

    pub async fn player_ready(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerReady {
            player_id: player_id.to_string(),
        })
        .await
    }

    /// Pay the ante, or confirm a blind
    pub async fn player_pay(&self, player_id: &str, chips: i64) -> TableResult<Table> {
        self.request(TableAction::PlayerPay {
            player_id: player_id.to_string(),
            chips,
        })
        .await
    }

    pub async fn player_bet(&self, player_id: &str, chips: i64) -> TableResult<Table> {
        self.request(TableAction::PlayerBet {
            player_id: player_id.to_string(),
            chips,
        })
        .await
    }

    /// Raise the round's wager to `chip_level`
    pub async fn player_raise(&self, player_id: &str, chip_level: i64) -> TableResult<Table> {
        self.request(TableAction::PlayerRaise {
            player_id: player_id.to_string(),
            chip_level,
        })
        .await
    }

    pub async fn player_call(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerCall {
            player_id: player_id.to_string(),
        })
        .await
    }

    pub async fn player_allin(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerAllin {
            player_id: player_id.to_string(),
        })
        .await
    }

    pub async fn player_check(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerCheck {
            player_id: player_id.to_string(),
        })
        .await
    }

    pub async fn player_fold(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerFold {
            player_id: player_id.to_string(),
        })
        .await
    }

    /// Check when possible, fold otherwise
    pub async fn player_pass(&self, player_id: &str) -> TableResult<Table> {
        self.request(TableAction::PlayerPass {
            player_id: player_id.to_string(),
        })
        .await
    }

    /// Send a command and wait for the table after it
    async fn request(&self, action: TableAction) -> TableResult<Table> {
        let sender = self.sender.as_ref().ok_or(TableError::TableNotFound)?;
        let (reply, response) = oneshot::channel();
        sender
            .send(Request {
                action,
                reply: Some(reply),
            })
            .map_err(|_| TableError::TableClosed)?;
        response.await.map_err(|_| TableError::TableClosed)?
    }
}
