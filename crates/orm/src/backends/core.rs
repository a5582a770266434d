//! Core Storage Backend Traits
//!
//! Rows are stored the way a relational schema would hold them: one row per
//! entity with its foreign key columns, plus pivot tables of id pairs for
//! many-to-many associations.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OrmResult;
use crate::model::EntityId;

/// A stored table row: primary key plus foreign key columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    /// Primary key value
    pub id: EntityId,
    /// Foreign key column -> referenced id
    pub columns: BTreeMap<String, EntityId>,
}

impl StoredRow {
    /// Create a row with no foreign keys
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            columns: BTreeMap::new(),
        }
    }

    /// Set a foreign key column
    pub fn with_column(mut self, column: impl Into<String>, value: EntityId) -> Self {
        self.columns.insert(column.into(), value);
        self
    }

    /// Read a foreign key column
    pub fn column(&self, column: &str) -> Option<EntityId> {
        self.columns.get(column).copied()
    }
}

/// One row of a pivot table
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PivotLink {
    /// Pivot table name
    pub table: String,
    /// Owning entity id
    pub local_id: EntityId,
    /// Related entity id
    pub foreign_id: EntityId,
}

/// Everything a unit of work writes on commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// (table, row) inserts in persist order
    pub rows: Vec<(String, StoredRow)>,
    /// Pivot inserts
    pub links: Vec<PivotLink>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.links.is_empty()
    }

    /// Check whether this change set inserts the given row
    pub fn contains_row(&self, table: &str, id: EntityId) -> bool {
        self.rows.iter().any(|(t, row)| t == table && row.id == id)
    }
}

/// Abstract storage backend
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Fetch a row by primary key
    async fn fetch_row(&self, table: &str, id: EntityId) -> OrmResult<Option<StoredRow>>;

    /// Fetch every row of a table, ordered by primary key
    async fn fetch_all(&self, table: &str) -> OrmResult<Vec<StoredRow>>;

    /// Related ids linked to `local_id` in a pivot table, ordered
    async fn fetch_pivot(&self, table: &str, local_id: EntityId) -> OrmResult<Vec<EntityId>>;

    /// Apply a change set atomically: either every row and link is written or none is
    async fn apply(&self, changes: ChangeSet) -> OrmResult<()>;

    /// Number of rows in a table
    async fn row_count(&self, table: &str) -> OrmResult<usize>;
}
