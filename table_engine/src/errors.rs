//! Table engine error types.

use thiserror::Error;

use crate::game::GameError;

/// Broad classification of a [`TableError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InvalidState,
    EngineFault,
}

/// Table engine errors
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TableError {
    // Not found
    #[error("table not found")]
    TableNotFound,

    #[error("player not found")]
    PlayerNotFound,

    #[error("participant not found")]
    ParticipantNotFound,

    // Invalid input
    #[error("invalid create table setting: {0}")]
    InvalidCreateTableSetting(String),

    #[error("no empty seats")]
    NoEmptySeats,

    #[error("not enough seats")]
    NotEnoughSeats,

    #[error("duplicate players")]
    DuplicatePlayers,

    #[error("duplicate seats")]
    DuplicateSeats,

    #[error("seat already is taken")]
    SeatAlreadyIsTaken,

    #[error("invalid seat {0}")]
    InvalidSeat(usize),

    #[error("invalid chips {0}")]
    InvalidChips(i64),

    // Invalid state
    #[error("player invalid action")]
    PlayerInvalidAction,

    #[error("invalid ready action")]
    InvalidReadyAction,

    #[error("invalid pay ante action")]
    InvalidPayAnteAction,

    #[error("table open game failed")]
    TableOpenGameFailed,

    #[error("table open game failed in blind breaking level")]
    TableOpenGameFailedInBlindBreakingLevel,

    #[error("unable to init positions")]
    UnableToInitPositions,

    #[error("already init positions")]
    AlreadyInitPositions,

    #[error("unable to rotate positions")]
    UnableToRotatePositions,

    #[error("invalid game action: {0}")]
    TablePlayerInvalidGameAction(#[from] GameError),

    #[error("table is closed")]
    TableClosed,

    // Engine fault
    #[error("game unknown event: {0}")]
    GameUnknownEvent(String),
}

impl TableError {
    /// Taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            TableError::TableNotFound
            | TableError::PlayerNotFound
            | TableError::ParticipantNotFound => ErrorKind::NotFound,

            TableError::InvalidCreateTableSetting(_)
            | TableError::NoEmptySeats
            | TableError::NotEnoughSeats
            | TableError::DuplicatePlayers
            | TableError::DuplicateSeats
            | TableError::SeatAlreadyIsTaken
            | TableError::InvalidSeat(_)
            | TableError::InvalidChips(_) => ErrorKind::InvalidInput,

            TableError::GameUnknownEvent(_) => ErrorKind::EngineFault,

            _ => ErrorKind::InvalidState,
        }
    }
}

/// Result type for table engine operations
pub type TableResult<T> = Result<T, TableError>;
