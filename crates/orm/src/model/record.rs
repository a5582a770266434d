//! Entity records - the flattened form of an entity inside a unit of work

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::primary_key::EntityId;

/// Flattened entity state: identity plus association targets by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity name
    pub entity: String,
    /// Identity
    pub id: EntityId,
    /// Many-to-one targets keyed by association name
    pub references: BTreeMap<String, EntityId>,
    /// Collection memberships keyed by association name
    pub collections: BTreeMap<String, BTreeSet<EntityId>>,
}

impl EntityRecord {
    /// Start a record for an entity instance
    pub fn new(entity: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity: entity.into(),
            id,
            references: BTreeMap::new(),
            collections: BTreeMap::new(),
        }
    }

    /// Add a many-to-one target
    pub fn reference(mut self, association: impl Into<String>, target: EntityId) -> Self {
        self.references.insert(association.into(), target);
        self
    }

    /// Add a collection membership
    pub fn collection<I>(mut self, association: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.collections
            .insert(association.into(), members.into_iter().collect());
        self
    }
}
