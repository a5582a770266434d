//! Hydration - untyped executor output and its conversion into typed models

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};
use crate::model::{EntityId, Model};
use crate::relationships::{Collection, Reference};

/// State of one association on a hydrated entity
#[derive(Debug, Clone, PartialEq)]
pub enum HydratedAssociation {
    /// Many-to-one: target id always known, target present when fetched
    Reference {
        id: EntityId,
        target: Option<Box<HydratedEntity>>,
    },
    /// Collection: members present when fetched
    Collection(Option<Vec<HydratedEntity>>),
}

impl HydratedAssociation {
    /// Check if the association was materialized
    pub fn is_loaded(&self) -> bool {
        match self {
            HydratedAssociation::Reference { target, .. } => target.is_some(),
            HydratedAssociation::Collection(members) => members.is_some(),
        }
    }
}

/// An entity as produced by the plan executor, before typed conversion
#[derive(Debug, Clone, PartialEq)]
pub struct HydratedEntity {
    /// Entity name
    pub entity: String,
    /// Identity
    pub id: EntityId,
    associations: BTreeMap<String, HydratedAssociation>,
}

impl HydratedEntity {
    /// Create an entity with no associations
    pub fn new(entity: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity: entity.into(),
            id,
            associations: BTreeMap::new(),
        }
    }

    /// Attach an association state
    pub fn with_association(mut self, name: impl Into<String>, association: HydratedAssociation) -> Self {
        self.associations.insert(name.into(), association);
        self
    }

    /// Look up an association state
    pub fn association(&self, name: &str) -> Option<&HydratedAssociation> {
        self.associations.get(name)
    }

    /// Convert this entity into a typed model, checking the entity name
    pub fn into_model<M: Model>(self) -> ModelResult<M> {
        if self.entity != M::entity_name() {
            return Err(ModelError::Serialization(format!(
                "Cannot hydrate {} from a {} row",
                M::entity_name(),
                self.entity
            )));
        }
        M::hydrate(self)
    }

    /// Remove a many-to-one association and convert it into a typed reference
    pub fn take_reference<T: Model>(&mut self, name: &str) -> ModelResult<Reference<T>> {
        match self.associations.remove(name) {
            Some(HydratedAssociation::Reference { id, target: None }) => Ok(Reference::Deferred(id)),
            Some(HydratedAssociation::Reference {
                target: Some(target),
                ..
            }) => Ok(Reference::resolved(target.into_model::<T>()?)),
            Some(HydratedAssociation::Collection(_)) => Err(ModelError::Serialization(format!(
                "{}.{} is a collection, not a reference",
                self.entity, name
            ))),
            None => Err(self.missing(name)),
        }
    }

    /// Remove a collection association and convert it into a typed collection
    pub fn take_collection<T: Model>(&mut self, name: &str) -> ModelResult<Collection<T>> {
        match self.associations.remove(name) {
            Some(HydratedAssociation::Collection(None)) => Ok(Collection::Deferred),
            Some(HydratedAssociation::Collection(Some(members))) => {
                let members = members
                    .into_iter()
                    .map(HydratedEntity::into_model::<T>)
                    .collect::<ModelResult<Vec<T>>>()?;
                Ok(Collection::resolved(members))
            }
            Some(HydratedAssociation::Reference { .. }) => Err(ModelError::Serialization(format!(
                "{}.{} is a reference, not a collection",
                self.entity, name
            ))),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> ModelError {
        ModelError::Serialization(format!(
            "{}#{} has no association '{}' in executor output",
            self.entity, self.id, name
        ))
    }
}
