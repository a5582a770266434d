//! Query Module - query text parsing, typed queries and SQL rendering for plans

pub mod builder;
pub mod joins;
pub mod parser;
pub mod sql_generation;
pub mod typed_query;
pub mod types;

pub use builder::QueryBuilder;
pub use parser::ParsedQuery;
pub use typed_query::TypedQuery;
pub use types::JoinType;
