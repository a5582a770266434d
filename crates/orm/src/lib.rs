//! # graphfetch-orm: in-memory persistence engine with selective eager loading
//!
//! Entities declare their associations through [`Model::metadata`]. Finds
//! and queries are planned as trees of association paths, executed as joins
//! over a [`StorageBackend`], and hydrated into typed models whose
//! associations are either materialized or deferred.
//!
//! ```text
//! Database ── create_session ──> Session ── begin ──> Transaction (persist / commit)
//!                                   │
//!                                   ├── find / find_with (EntityGraph, GraphSemantic)
//!                                   └── create_query ──> TypedQuery (join fetch)
//! ```

pub mod backends;
pub mod config;
pub mod database;
pub mod error;
pub mod loading;
pub mod model;
pub mod query;
pub mod relationships;
pub mod session;
pub mod transaction;

// Re-export core traits and types
pub use backends::{ChangeSet, MemoryBackend, PivotLink, StorageBackend, StoredRow};
pub use config::{ConfigError, OrmConfig};
pub use database::{Database, PersistenceUnitUtil};
pub use error::{ModelError, ModelResult, OrmError, OrmResult, RelationshipError};
pub use loading::{
    EntityGraph, FetchNode, FetchPlan, GraphSemantic, HydratedAssociation, HydratedEntity,
    PlanStatistics, QueryPlan,
};
pub use model::{EntityId, EntityRecord, Model};
pub use query::{ParsedQuery, TypedQuery};
pub use relationships::{
    Collection, EntityMetadata, FetchType, LoadState, PivotConfig, Reference, RelationshipMetadata,
    RelationshipType, SchemaRegistry,
};
pub use session::{FindOptions, Session};
pub use transaction::Transaction;
