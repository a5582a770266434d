//! Relationship Metadata System - Core metadata definitions for entities and associations

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult, RelationshipError};

/// Defines the type of association between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// Many-to-one reference held as a foreign key column on the owner
    BelongsTo,
    /// Many-to-many collection held in a pivot table
    ManyToMany,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::ManyToMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::ManyToMany)
    }
}

/// Declared fetch strategy of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FetchType {
    /// Materialized only when a plan asks for it
    #[default]
    Lazy,
    /// Joined whenever the owner is loaded without a fetch graph
    Eager,
}

/// Pivot table configuration for many-to-many relationships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotConfig {
    /// The pivot table name
    pub table: String,

    /// The column holding the owning entity id
    pub local_key: String,

    /// The column holding the related entity id
    pub foreign_key: String,
}

impl PivotConfig {
    /// Create a new pivot configuration
    pub fn new(table: impl Into<String>, local_key: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Validate the pivot configuration
    pub fn validate(&self) -> ModelResult<()> {
        if self.table.is_empty() {
            return Err(ModelError::Configuration(
                "Pivot table name cannot be empty".to_string(),
            ));
        }

        if self.local_key.is_empty() || self.foreign_key.is_empty() {
            return Err(ModelError::Configuration(
                "Pivot key columns cannot be empty".to_string(),
            ));
        }

        if self.local_key == self.foreign_key {
            return Err(ModelError::Configuration(
                "Pivot local key and foreign key must be different".to_string(),
            ));
        }

        Ok(())
    }
}

/// Association metadata: everything the planner needs to emit a join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// The type of relationship
    pub relationship_type: RelationshipType,

    /// Name of the association (field name in the model)
    pub name: String,

    /// Entity name of the target
    pub related_model: String,

    /// Foreign key column on the owner table (belongs-to only)
    pub foreign_key: Option<String>,

    /// Pivot table configuration (many-to-many only)
    pub pivot_config: Option<PivotConfig>,

    /// Declared fetch strategy
    pub fetch: FetchType,
}

impl RelationshipMetadata {
    /// Declare a lazy many-to-one association
    pub fn belongs_to(
        name: impl Into<String>,
        related_model: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            relationship_type: RelationshipType::BelongsTo,
            name: name.into(),
            related_model: related_model.into(),
            foreign_key: Some(foreign_key.into()),
            pivot_config: None,
            fetch: FetchType::Lazy,
        }
    }

    /// Declare a lazy many-to-many association
    pub fn many_to_many(
        name: impl Into<String>,
        related_model: impl Into<String>,
        pivot: PivotConfig,
    ) -> Self {
        Self {
            relationship_type: RelationshipType::ManyToMany,
            name: name.into(),
            related_model: related_model.into(),
            foreign_key: None,
            pivot_config: Some(pivot),
            fetch: FetchType::Lazy,
        }
    }

    /// Override the declared fetch strategy
    pub fn with_fetch(mut self, fetch: FetchType) -> Self {
        self.fetch = fetch;
        self
    }

    /// Returns true if the association is declared eager
    pub fn is_eager(&self) -> bool {
        self.fetch == FetchType::Eager
    }

    /// Returns true if this association holds a collection
    pub fn is_collection(&self) -> bool {
        self.relationship_type.is_collection()
    }

    /// Validate the relationship metadata for consistency
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() {
            return Err(RelationshipError::InvalidConfiguration(
                "Relationship name cannot be empty".to_string(),
            )
            .into());
        }

        match self.relationship_type {
            RelationshipType::BelongsTo => {
                if self.foreign_key.as_deref().map_or(true, str::is_empty) {
                    return Err(RelationshipError::InvalidConfiguration(format!(
                        "Relationship '{}' of type BelongsTo requires a foreign key column",
                        self.name
                    ))
                    .into());
                }
            }
            RelationshipType::ManyToMany => match &self.pivot_config {
                Some(pivot) => pivot.validate()?,
                None => {
                    return Err(RelationshipError::InvalidConfiguration(format!(
                        "Relationship '{}' of type ManyToMany requires pivot configuration",
                        self.name
                    ))
                    .into())
                }
            },
        }

        Ok(())
    }
}

/// Entity metadata: name, table and declared associations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// Entity name as used in queries
    pub name: String,
    /// Backing table name
    pub table: String,
    /// Primary key column
    pub primary_key: String,
    /// Declared associations, in declaration order
    pub relationships: Vec<RelationshipMetadata>,
}

impl EntityMetadata {
    /// Metadata for an entity whose table shares its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            primary_key: "id".to_string(),
            relationships: Vec::new(),
        }
    }

    /// Set the backing table
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Declare an association
    pub fn with_relationship(mut self, relationship: RelationshipMetadata) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Look up an association by name
    pub fn relationship(&self, name: &str) -> Option<&RelationshipMetadata> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Look up an association by name, failing with `InvalidPlan`
    pub fn require_relationship(&self, name: &str) -> ModelResult<&RelationshipMetadata> {
        self.relationship(name).ok_or_else(|| {
            RelationshipError::NotFound(format!(
                "{} has no association named '{}'",
                self.name, name
            ))
            .into()
        })
    }

    /// Validate every association and reject duplicate names
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.trim().is_empty() || self.table.trim().is_empty() {
            return Err(ModelError::Configuration(
                "Entity name and table cannot be empty".to_string(),
            ));
        }

        for (index, relationship) in self.relationships.iter().enumerate() {
            relationship.validate()?;
            if self.relationships[..index]
                .iter()
                .any(|r| r.name == relationship.name)
            {
                return Err(ModelError::Configuration(format!(
                    "{} declares association '{}' twice",
                    self.name, relationship.name
                )));
            }
        }

        Ok(())
    }
}
