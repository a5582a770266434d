//! Query Builder - Core builder implementation

use serde_json::Value;

use super::types::*;

/// Builder for the SELECT statements that plans render for logging
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    pub(crate) select_fields: Vec<String>,
    pub(crate) from_table: Option<(String, String)>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) where_conditions: Vec<WhereCondition>,
    pub(crate) distinct: bool,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add selected columns
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the FROM table and its alias
    pub fn from(mut self, table: &str, alias: &str) -> Self {
        self.from_table = Some((table.to_string(), alias.to_string()));
        self
    }

    /// Make the query SELECT DISTINCT
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a WHERE column = value condition
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_conditions.push(WhereCondition {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }
}
