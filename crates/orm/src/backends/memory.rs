//! In-memory storage backend
//!
//! Tables live behind a single `tokio::sync::RwLock`; `apply` validates the
//! whole change set under the write lock before touching any table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::core::{ChangeSet, PivotLink, StorageBackend, StoredRow};
use crate::error::{ModelError, OrmResult};
use crate::model::EntityId;

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<String, BTreeMap<EntityId, StoredRow>>,
    pivots: HashMap<String, BTreeSet<(EntityId, EntityId)>>,
}

/// Storage backend holding all tables in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn fetch_row(&self, table: &str, id: EntityId) -> OrmResult<Option<StoredRow>> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(table).and_then(|rows| rows.get(&id)).cloned())
    }

    async fn fetch_all(&self, table: &str) -> OrmResult<Vec<StoredRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rows
            .get(table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_pivot(&self, table: &str, local_id: EntityId) -> OrmResult<Vec<EntityId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .pivots
            .get(table)
            .map(|links| {
                links
                    .range((local_id, EntityId::MIN)..=(local_id, EntityId::MAX))
                    .map(|(_, foreign_id)| *foreign_id)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn apply(&self, changes: ChangeSet) -> OrmResult<()> {
        let mut tables = self.tables.write().await;

        // Validate everything first so a failure leaves no partial state
        {
            let mut staged: HashMap<&str, BTreeSet<EntityId>> = HashMap::new();
            for (table, row) in &changes.rows {
                let exists = tables
                    .rows
                    .get(table)
                    .map_or(false, |rows| rows.contains_key(&row.id));
                if exists || !staged.entry(table.as_str()).or_default().insert(row.id) {
                    return Err(ModelError::Validation(format!(
                        "Duplicate primary key {} in table '{}'",
                        row.id, table
                    )));
                }
            }
        }

        let row_count = changes.rows.len();
        let link_count = changes.links.len();

        for (table, row) in changes.rows {
            tables.rows.entry(table).or_default().insert(row.id, row);
        }
        for PivotLink {
            table,
            local_id,
            foreign_id,
        } in changes.links
        {
            tables
                .pivots
                .entry(table)
                .or_default()
                .insert((local_id, foreign_id));
        }

        debug!("Applied change set: {} rows, {} pivot links", row_count, link_count);
        Ok(())
    }

    async fn row_count(&self, table: &str) -> OrmResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables.rows.get(table).map_or(0, BTreeMap::len))
    }
}
