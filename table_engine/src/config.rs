//! Engine options and table creation settings.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{
    blind::BlindSetting,
    table::{JoinPlayer, TableMeta},
};

/// Runtime options of a table engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Seconds between a settled hand and the next auto-open (0 in tests)
    pub interval_secs: u64,

    /// Timeout of the per-hand ready groups (round start, ante)
    pub ready_timeout_secs: u64,

    /// Timeout of the inter-hand "ready to open" group
    pub open_game_timeout_secs: u64,

    /// Delay before the end callback fires once the table ran out of time
    pub end_game_delay_secs: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            interval_secs: 0,
            ready_timeout_secs: 1,
            open_game_timeout_secs: 1,
            end_game_delay_secs: 1,
        }
    }
}

impl EngineOptions {
    /// Load options from environment variables, falling back to defaults
    ///
    /// Recognised variables:
    /// - `TABLE_ENGINE_INTERVAL_SECS`
    /// - `TABLE_ENGINE_READY_TIMEOUT_SECS`
    /// - `TABLE_ENGINE_OPEN_GAME_TIMEOUT_SECS`
    /// - `TABLE_ENGINE_END_GAME_DELAY_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval_secs: parse_env_or("TABLE_ENGINE_INTERVAL_SECS", defaults.interval_secs),
            ready_timeout_secs: parse_env_or(
                "TABLE_ENGINE_READY_TIMEOUT_SECS",
                defaults.ready_timeout_secs,
            ),
            open_game_timeout_secs: parse_env_or(
                "TABLE_ENGINE_OPEN_GAME_TIMEOUT_SECS",
                defaults.open_game_timeout_secs,
            ),
            end_game_delay_secs: parse_env_or(
                "TABLE_ENGINE_END_GAME_DELAY_SECS",
                defaults.end_game_delay_secs,
            ),
        }
    }

    /// Validate options
    pub fn validate(&self) -> Result<(), String> {
        if self.ready_timeout_secs == 0 {
            return Err("Ready timeout must be at least 1 second".to_string());
        }

        if self.open_game_timeout_secs == 0 {
            return Err("Open game timeout must be at least 1 second".to_string());
        }

        Ok(())
    }
}

/// Parse an environment variable, using `default` when it is missing or malformed
fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Everything needed to create a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSetting {
    /// Table ID, generated when empty
    pub table_id: String,

    pub meta: TableMeta,

    pub blind: BlindSetting,

    /// Players reserved at creation time
    #[serde(default)]
    pub join_players: Vec<JoinPlayer>,
}

impl TableSetting {
    /// Validate setting
    pub fn validate(&self) -> Result<(), String> {
        let meta = &self.meta;

        if meta.max_seats < 2 || meta.max_seats > 9 {
            return Err("Max seats must be between 2 and 9".to_string());
        }

        if meta.min_players < 2 || meta.min_players > meta.max_seats {
            return Err("Min players must be between 2 and max seats".to_string());
        }

        if meta.min_chip_unit <= 0 {
            return Err("Min chip unit must be positive".to_string());
        }

        if meta.action_time_secs < 0 || meta.max_duration_secs < 0 {
            return Err("Durations must not be negative".to_string());
        }

        self.blind.validate()?;

        if self.join_players.len() > meta.max_seats {
            return Err("More join players than seats".to_string());
        }

        let mut ids = HashSet::new();
        for player in &self.join_players {
            if player.player_id.is_empty() {
                return Err("Player ID must not be empty".to_string());
            }
            if !ids.insert(player.player_id.as_str()) {
                return Err(format!("Duplicate join player {}", player.player_id));
            }
            if player.redeem_chips <= 0 {
                return Err(format!("Player {} buy-in must be positive", player.player_id));
            }
            if let Some(seat) = player.seat
                && seat >= meta.max_seats
            {
                return Err(format!("Player {} seat {} out of range", player.player_id, seat));
            }
        }

        Ok(())
    }
}
