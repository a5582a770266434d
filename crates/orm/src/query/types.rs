//! Query Builder Types - Core types and enums for query building

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `column = value` condition
#[derive(Debug, Clone)]
pub struct WhereCondition {
    pub column: String,
    pub value: Value,
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Rows without a match are dropped
    Inner,
    /// Rows without a match are kept with an empty slot
    Left,
}

impl JoinType {
    /// The stronger of two joins on the same path: inner wins
    pub fn combine(self, other: JoinType) -> JoinType {
        if self == JoinType::Inner || other == JoinType::Inner {
            JoinType::Inner
        } else {
            JoinType::Left
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT OUTER JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: String,
    pub on_conditions: Vec<(String, String)>, // (left_column, right_column)
}
