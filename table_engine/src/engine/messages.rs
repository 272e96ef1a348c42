//! Table worker message types.

use tokio::sync::{mpsc, oneshot};

use crate::{
    errors::TableResult,
    table::{JoinPlayer, Table},
};

/// Commands handled by the table worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    // Table lifecycle
    CloseTable,
    BalanceTable,
    StartTableGame,
    TableGameOpen,
    DeleteTable,

    // Membership
    PlayerReserve(JoinPlayer),
    PlayersBatchReserve(Vec<JoinPlayer>),
    PlayerJoin { player_id: String },
    PlayerRedeemChips(JoinPlayer),
    PlayersLeave(Vec<String>),

    // Per-hand actions
    PlayerReady { player_id: String },
    PlayerPay { player_id: String, chips: i64 },
    PlayerBet { player_id: String, chips: i64 },
    PlayerRaise { player_id: String, chip_level: i64 },
    PlayerCall { player_id: String },
    PlayerAllin { player_id: String },
    PlayerCheck { player_id: String },
    PlayerFold { player_id: String },
    PlayerPass { player_id: String },

    /// Read-only snapshot
    GetTable,

    // Internal: enqueued by ready groups and timers
    RoundReadiesCompleted { game_count: i64 },
    AnteReadiesCompleted { game_count: i64 },
    OpenGameReadiesCompleted { schedule_id: u64 },
    OpenGameIntervalElapsed { schedule_id: u64 },
    BreakEnded { schedule_id: u64 },
    AutoGameOpenEnd,
}

impl TableAction {
    /// Event name reported to observers
    pub fn name(&self) -> &'static str {
        match self {
            Self::CloseTable => "CloseTable",
            Self::BalanceTable => "BalanceTable",
            Self::StartTableGame => "StartTableGame",
            Self::TableGameOpen => "TableGameOpen",
            Self::DeleteTable => "DeleteTable",
            Self::PlayerReserve(_) => "PlayerReserve",
            Self::PlayersBatchReserve(_) => "PlayersBatchReserve",
            Self::PlayerJoin { .. } => "PlayerJoin",
            Self::PlayerRedeemChips(_) => "PlayerRedeemChips",
            Self::PlayersLeave(_) => "PlayersLeave",
            Self::PlayerReady { .. } => "PlayerReady",
            Self::PlayerPay { .. } => "PlayerPay",
            Self::PlayerBet { .. } => "PlayerBet",
            Self::PlayerRaise { .. } => "PlayerRaise",
            Self::PlayerCall { .. } => "PlayerCall",
            Self::PlayerAllin { .. } => "PlayerAllin",
            Self::PlayerCheck { .. } => "PlayerCheck",
            Self::PlayerFold { .. } => "PlayerFold",
            Self::PlayerPass { .. } => "PlayerPass",
            Self::GetTable => "GetTable",
            Self::RoundReadiesCompleted { .. } => "RoundReadiesCompleted",
            Self::AnteReadiesCompleted { .. } => "AnteReadiesCompleted",
            Self::OpenGameReadiesCompleted { .. } => "OpenGameReadiesCompleted",
            Self::OpenGameIntervalElapsed { .. } => "OpenGameIntervalElapsed",
            Self::BreakEnded { .. } => "BreakEnded",
            Self::AutoGameOpenEnd => "AutoGameOpenEnd",
        }
    }

    /// Enqueued by the worker itself rather than a caller
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::RoundReadiesCompleted { .. }
                | Self::AnteReadiesCompleted { .. }
                | Self::OpenGameReadiesCompleted { .. }
                | Self::OpenGameIntervalElapsed { .. }
                | Self::BreakEnded { .. }
                | Self::AutoGameOpenEnd
        )
    }
}

/// A command plus the channel its result goes back on
#[derive(Debug)]
pub struct Request {
    pub action: TableAction,
    /// `None` for internal commands
    pub reply: Option<oneshot::Sender<TableResult<Table>>>,
}

/// Enqueue an internal command if the worker is still alive
pub(crate) fn send_internal(sender: &mpsc::WeakUnboundedSender<Request>, action: TableAction) {
    let Some(sender) = sender.upgrade() else {
        log::debug!("Dropping {}: table worker is gone", action.name());
        return;
    };
    if sender.send(Request { action, reply: None }).is_err() {
        log::debug!("Dropping internal command: table worker stopped");
    }
}
