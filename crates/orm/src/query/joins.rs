//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl QueryBuilder {
    /// Add a join of the given type
    pub fn join_with(
        mut self,
        join_type: JoinType,
        table: &str,
        alias: &str,
        left_col: &str,
        right_col: &str,
    ) -> Self {
        self.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            alias: alias.to_string(),
            on_conditions: vec![(left_col.to_string(), right_col.to_string())],
        });
        self
    }
}
