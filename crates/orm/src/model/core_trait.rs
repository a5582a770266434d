//! Core Model Trait - Base definition for persisted entities
//!
//! An entity declares its schema through `metadata()`, flattens itself into an
//! `EntityRecord` for persistence, and rebuilds itself from a
//! `HydratedEntity` produced by the fetch executor. Load-state introspection
//! goes through `load_state`, which must never force a load.

use std::fmt::Debug;

use super::primary_key::EntityId;
use super::record::EntityRecord;
use crate::error::ModelResult;
use crate::loading::HydratedEntity;
use crate::relationships::{EntityMetadata, LoadState};

/// Core trait for persisted entities
pub trait Model: Debug + Send + Sync + Sized + 'static {
    /// Entity name used in queries, plans and the registry
    fn entity_name() -> &'static str;

    /// Table and association declarations for this entity
    fn metadata() -> EntityMetadata;

    /// Identity of this instance
    fn id(&self) -> EntityId;

    /// Flatten this instance for persistence
    fn to_record(&self) -> ModelResult<EntityRecord>;

    /// Rebuild an instance from executor output
    fn hydrate(entity: HydratedEntity) -> ModelResult<Self>;

    /// Load state of a named association, `None` if the entity has no such association
    fn load_state(&self, association: &str) -> Option<LoadState>;
}
