//! Registry of running tables.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use crate::{
    config::TableSetting,
    engine::TableEngine,
    errors::{TableError, TableResult},
    table::Table,
};

/// Table ID -> engine map
#[derive(Clone, Default)]
pub struct TableManager {
    tables: Arc<RwLock<HashMap<String, Arc<TableEngine>>>>,
}

impl TableManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table on `engine` and register it
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine with its observers registered
    /// * `setting` - Table setting
    ///
    /// # Returns
    ///
    /// * `Table` - The created table
    pub async fn create_table(
        &self,
        mut engine: TableEngine,
        setting: TableSetting,
    ) -> TableResult<Table> {
        // The write lock spans the check and the insert
        let mut tables = self.tables.write().await;
        if !setting.table_id.is_empty() && tables.contains_key(&setting.table_id) {
            return Err(TableError::InvalidCreateTableSetting(format!(
                "table {} already exists",
                setting.table_id
            )));
        }

        let table = engine.create_table(setting)?;
        tables.insert(table.id.clone(), Arc::new(engine));
        log::info!("Registered table {}", table.id);
        Ok(table)
    }

    /// Engine of `table_id`
    pub async fn get(&self, table_id: &str) -> TableResult<Arc<TableEngine>> {
        self.tables
            .read()
            .await
            .get(table_id)
            .cloned()
            .ok_or(TableError::TableNotFound)
    }

    /// Delete the table and forget it
    pub async fn delete_table(&self, table_id: &str) -> TableResult<Table> {
        let engine = self
            .tables
            .write()
            .await
            .remove(table_id)
            .ok_or(TableError::TableNotFound)?;
        log::info!("Unregistered table {}", table_id);
        engine.delete_table().await
    }

    pub async fn count(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn table_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blind::{BlindLevel, BlindSetting},
        config::EngineOptions,
        game::HoldemFactory,
        table::{CompetitionMode, Rule, TableMeta},
    };

    fn setting(table_id: &str) -> TableSetting {
        TableSetting {
            table_id: table_id.to_string(),
            meta: TableMeta {
                competition_id: "c1".to_string(),
                rule: Rule::Default,
                mode: CompetitionMode::Cash,
                max_duration_secs: 0,
                max_seats: 6,
                min_players: 2,
                min_chip_unit: 10,
                action_time_secs: 10,
            },
            blind: BlindSetting {
                levels: vec![BlindLevel::new(1, 10, 20, 600)],
                initial_level: 1,
                final_buy_in_level: 1,
            },
            join_players: vec![],
        }
    }

    fn engine() -> TableEngine {
        TableEngine::new(EngineOptions::default(), Arc::new(HoldemFactory::new()))
    }

    #[tokio::test]
    async fn test_create_get_delete() {
        let manager = TableManager::new();
        manager.create_table(engine(), setting("t1")).await.unwrap();
        manager.create_table(engine(), setting("t2")).await.unwrap();
        assert_eq!(manager.count().await, 2);
        assert_eq!(manager.table_ids().await, vec!["t1", "t2"]);

        let table = manager.get("t1").await.unwrap().table().await.unwrap();
        assert_eq!(table.id, "t1");

        let deleted = manager.delete_table("t1").await.unwrap();
        assert_eq!(deleted.state.status, crate::table::TableStatus::Closed);
        assert_eq!(manager.count().await, 1);
        assert!(matches!(manager.get("t1").await, Err(TableError::TableNotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_table_id_rejected() {
        let manager = TableManager::new();
        manager.create_table(engine(), setting("t1")).await.unwrap();
        let err = manager.create_table(engine(), setting("t1")).await.unwrap_err();
        assert!(matches!(err, TableError::InvalidCreateTableSetting(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_creates_register_one_table() {
        let manager = TableManager::new();
        let (first, second) = tokio::join!(
            manager.create_table(engine(), setting("t1")),
            manager.create_table(engine(), setting("t1"))
        );

        assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);
        assert_eq!(manager.count().await, 1);
    }

    #[tokio::test]
    async fn test_generated_table_id() {
        let manager = TableManager::new();
        let table = manager.create_table(engine(), setting("")).await.unwrap();
        assert!(!table.id.is_empty());
        assert!(manager.get(&table.id).await.is_ok());
    }
}
