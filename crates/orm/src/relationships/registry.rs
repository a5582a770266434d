//! Relationship Registry - Runtime schema storage and lookup

use std::sync::Arc;

use dashmap::DashMap;

use super::metadata::{EntityMetadata, RelationshipMetadata};
use crate::error::{ModelError, ModelResult};

/// Thread-safe registry of entity metadata, shared by every session of a database
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    /// Map of entity name -> metadata
    entities: Arc<DashMap<String, EntityMetadata>>,
    /// Map of table name -> entity name, for SQL rendering and storage routing
    tables: Arc<DashMap<String, String>>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity's metadata
    pub fn register(&self, metadata: EntityMetadata) -> ModelResult<()> {
        metadata.validate()?;

        if self.entities.contains_key(&metadata.name) {
            return Err(ModelError::Configuration(format!(
                "Entity '{}' is already registered",
                metadata.name
            )));
        }

        if let Some(owner) = self.tables.get(&metadata.table) {
            return Err(ModelError::Configuration(format!(
                "Table '{}' is already mapped by entity '{}'",
                metadata.table,
                owner.value()
            )));
        }

        tracing::debug!(
            "Registering entity {} (table {}, {} associations)",
            metadata.name,
            metadata.table,
            metadata.relationships.len()
        );

        self.tables
            .insert(metadata.table.clone(), metadata.name.clone());
        self.entities.insert(metadata.name.clone(), metadata);
        Ok(())
    }

    /// Get entity metadata by name
    pub fn get(&self, entity: &str) -> Option<EntityMetadata> {
        self.entities.get(entity).map(|entry| entry.clone())
    }

    /// Get entity metadata by name, failing if it was never registered
    pub fn require(&self, entity: &str) -> ModelResult<EntityMetadata> {
        self.get(entity).ok_or_else(|| {
            ModelError::Configuration(format!("Entity '{}' is not registered", entity))
        })
    }

    /// Check if an entity is registered
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// Get association metadata by entity and association name
    pub fn relationship(&self, entity: &str, name: &str) -> ModelResult<RelationshipMetadata> {
        let metadata = self.require(entity)?;
        metadata.require_relationship(name).cloned()
    }

    /// Names of all registered entities, sorted
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Check that every association targets a registered entity
    pub fn validate(&self) -> ModelResult<()> {
        for entry in self.entities.iter() {
            for relationship in &entry.value().relationships {
                if !self.contains(&relationship.related_model) {
                    return Err(ModelError::Configuration(format!(
                        "{}.{} targets unregistered entity '{}'",
                        entry.key(),
                        relationship.name,
                        relationship.related_model
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::metadata::RelationshipMetadata;

    fn company() -> EntityMetadata {
        EntityMetadata::new("Company")
    }

    fn department() -> EntityMetadata {
        EntityMetadata::new("Department")
            .with_relationship(RelationshipMetadata::belongs_to("company", "Company", "company_id"))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = SchemaRegistry::new();
        registry.register(company()).unwrap();
        registry.register(department()).unwrap();

        assert!(registry.contains("Company"));
        assert_eq!(registry.entity_names(), vec!["Company", "Department"]);
        assert_eq!(
            registry.relationship("Department", "company").unwrap().related_model,
            "Company"
        );
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = SchemaRegistry::new();
        registry.register(company()).unwrap();
        assert!(registry.register(company()).is_err());
    }

    #[test]
    fn test_unregistered_target_fails_validation() {
        let registry = SchemaRegistry::new();
        registry.register(department()).unwrap();
        assert!(matches!(registry.validate(), Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_unknown_relationship_is_invalid_plan() {
        let registry = SchemaRegistry::new();
        registry.register(company()).unwrap();
        let err = registry.relationship("Company", "owner").unwrap_err();
        assert!(err.is_invalid_plan());
    }
}
