//! Relationship Containers - two-state holders for association values
//!
//! A many-to-one is either a deferred reference that only knows the target id,
//! or the resolved target. A collection is either deferred (membership
//! unknown) or the resolved set of members. Reading a deferred container is
//! an error; nothing here ever triggers a fetch.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::{EntityId, Model};

/// Load state of an association, as reported by introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadState {
    /// Holds materialized data
    Loaded,
    /// Left as a deferred reference
    Deferred,
}

impl LoadState {
    /// Returns true for `Loaded`
    pub fn is_loaded(self) -> bool {
        matches!(self, LoadState::Loaded)
    }
}

/// Many-to-one association holder
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T> {
    /// Only the target id is known
    Deferred(EntityId),
    /// The target has been materialized
    Resolved(Box<T>),
}

impl<T: Model> Reference<T> {
    /// Wrap a materialized target
    pub fn resolved(target: T) -> Self {
        Reference::Resolved(Box::new(target))
    }

    /// Target id, known in both states
    pub fn id(&self) -> EntityId {
        match self {
            Reference::Deferred(id) => *id,
            Reference::Resolved(target) => target.id(),
        }
    }

    /// Check if the target is materialized
    pub fn is_loaded(&self) -> bool {
        matches!(self, Reference::Resolved(_))
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        if self.is_loaded() {
            LoadState::Loaded
        } else {
            LoadState::Deferred
        }
    }

    /// Get the target if it is materialized
    pub fn get(&self) -> Option<&T> {
        match self {
            Reference::Resolved(target) => Some(target),
            Reference::Deferred(_) => None,
        }
    }

    /// Get the target, returning an error if it is deferred
    pub fn try_get(&self) -> ModelResult<&T> {
        self.get().ok_or_else(|| {
            ModelError::NotLoaded(format!(
                "{}#{} is a deferred reference",
                T::entity_name(),
                self.id()
            ))
        })
    }
}

/// Collection association holder. Members are unique by id and kept sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection<T> {
    /// Membership is unknown
    Deferred,
    /// Members have been materialized
    Resolved(Vec<T>),
}

impl<T: Model> Collection<T> {
    /// Build a resolved collection, dropping duplicate ids (first occurrence wins)
    pub fn resolved<I>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut values: Vec<T> = Vec::new();
        for member in members {
            if !values.iter().any(|existing| existing.id() == member.id()) {
                values.push(member);
            }
        }
        values.sort_by_key(|member| member.id());
        Collection::Resolved(values)
    }

    /// Check if membership is materialized
    pub fn is_loaded(&self) -> bool {
        matches!(self, Collection::Resolved(_))
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        if self.is_loaded() {
            LoadState::Loaded
        } else {
            LoadState::Deferred
        }
    }

    /// Get the members if they are materialized
    pub fn get(&self) -> Option<&[T]> {
        match self {
            Collection::Resolved(members) => Some(members),
            Collection::Deferred => None,
        }
    }

    /// Get the members, returning an error if the collection is deferred
    pub fn try_get(&self) -> ModelResult<&[T]> {
        self.get().ok_or_else(|| {
            ModelError::NotLoaded(format!(
                "collection of {} is deferred",
                T::entity_name()
            ))
        })
    }

    /// Member ids, if materialized
    pub fn ids(&self) -> Option<Vec<EntityId>> {
        self.get()
            .map(|members| members.iter().map(Model::id).collect())
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Collection::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loading::HydratedEntity;
    use crate::model::EntityRecord;
    use crate::relationships::EntityMetadata;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: EntityId,
    }

    impl Model for Tag {
        fn entity_name() -> &'static str {
            "Tag"
        }

        fn metadata() -> EntityMetadata {
            EntityMetadata::new("Tag")
        }

        fn id(&self) -> EntityId {
            self.id
        }

        fn to_record(&self) -> ModelResult<EntityRecord> {
            Ok(EntityRecord::new("Tag", self.id))
        }

        fn hydrate(entity: HydratedEntity) -> ModelResult<Self> {
            Ok(Tag { id: entity.id })
        }

        fn load_state(&self, _association: &str) -> Option<LoadState> {
            None
        }
    }

    #[test]
    fn test_deferred_reference() {
        let reference: Reference<Tag> = Reference::Deferred(4);
        assert_eq!(reference.id(), 4);
        assert!(!reference.is_loaded());
        assert_eq!(reference.load_state(), LoadState::Deferred);
        assert!(reference.get().is_none());
        assert!(matches!(reference.try_get(), Err(ModelError::NotLoaded(_))));
    }

    #[test]
    fn test_resolved_reference() {
        let reference = Reference::resolved(Tag { id: 9 });
        assert_eq!(reference.id(), 9);
        assert!(reference.is_loaded());
        assert_eq!(reference.try_get().unwrap(), &Tag { id: 9 });
    }

    #[test]
    fn test_collection_dedups_and_sorts() {
        let collection = Collection::resolved(vec![Tag { id: 3 }, Tag { id: 1 }, Tag { id: 3 }]);
        assert_eq!(collection.ids(), Some(vec![1, 3]));
        assert_eq!(collection.load_state(), LoadState::Loaded);
    }

    #[test]
    fn test_deferred_collection_has_no_membership() {
        let collection: Collection<Tag> = Collection::default();
        assert!(!collection.is_loaded());
        assert_eq!(collection.ids(), None);
        assert!(collection.try_get().is_err());
    }
}
