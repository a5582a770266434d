//! Transaction Management
//!
//! A unit of work stages persisted entities and writes them with a single
//! atomic backend call on commit. Dropping an uncommitted unit of work
//! discards everything it staged.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::backends::{ChangeSet, PivotLink, StoredRow};
use crate::error::{ModelError, ModelResult};
use crate::model::{EntityId, EntityRecord, Model};
use crate::relationships::{EntityMetadata, RelationshipType};
use crate::session::Session;

/// Unit of work bound to a session
pub struct Transaction<'s> {
    session: &'s Session,
    staged: Vec<EntityRecord>,
    finished: bool,
}

impl<'s> std::fmt::Debug for Transaction<'s> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("session", &self.session.id())
            .field("staged", &self.staged.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        debug!("Beginning transaction on session {}", session.id());
        Self {
            session,
            staged: Vec::new(),
            finished: false,
        }
    }

    /// Stage an entity for insertion
    pub fn persist<M: Model>(&mut self, entity: &M) -> ModelResult<()> {
        let record = entity.to_record()?;
        if record.entity != M::entity_name() {
            return Err(ModelError::Validation(format!(
                "{} produced a record for '{}'",
                M::entity_name(),
                record.entity
            )));
        }
        if !self.session.database().registry().contains(&record.entity) {
            return Err(ModelError::Configuration(format!(
                "Entity '{}' is not registered",
                record.entity
            )));
        }
        if self.is_staged(&record.entity, record.id) {
            return Err(ModelError::Validation(format!(
                "{}#{} is already persisted in this unit of work",
                record.entity, record.id
            )));
        }

        debug!("Staged {}#{}", record.entity, record.id);
        self.staged.push(record);
        Ok(())
    }

    /// Number of staged entities
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Check if the transaction is still active (not committed or rolled back)
    pub fn is_active(&self) -> bool {
        !self.finished
    }

    /// Validate staged entities and write them atomically
    pub async fn commit(mut self) -> ModelResult<()> {
        self.finished = true;
        let staged = std::mem::take(&mut self.staged);
        debug!("Committing transaction with {} entities", staged.len());

        let changes = self.build_change_set(&staged).await?;
        let backend = self.session.database().backend();
        backend.apply(changes).await.map_err(|e| match e {
            ModelError::Validation(_) => e,
            other => ModelError::Transaction(format!("Failed to commit transaction: {}", other)),
        })?;

        debug!("Transaction committed successfully");
        Ok(())
    }

    /// Discard staged entities
    pub async fn rollback(mut self) -> ModelResult<()> {
        self.finished = true;
        debug!("Rolling back transaction ({} staged entities discarded)", self.staged.len());
        self.staged.clear();
        Ok(())
    }

    fn is_staged(&self, entity: &str, id: EntityId) -> bool {
        self.staged.iter().any(|r| r.entity == entity && r.id == id)
    }

    async fn build_change_set(&self, staged: &[EntityRecord]) -> ModelResult<ChangeSet> {
        let registry = self.session.database().registry();
        let mut changes = ChangeSet::new();

        for record in staged {
            let metadata = registry.require(&record.entity)?;
            check_declared(&metadata, record)?;

            let mut row = StoredRow::new(record.id);
            for relationship in &metadata.relationships {
                match relationship.relationship_type {
                    RelationshipType::BelongsTo => {
                        let target = record.references.get(&relationship.name).copied().ok_or_else(|| {
                            ModelError::Validation(format!(
                                "{}#{} has no value for required association '{}'",
                                record.entity, record.id, relationship.name
                            ))
                        })?;
                        self.check_target(staged, &relationship.related_model, target, record, &relationship.name)
                            .await?;
                        let column = relationship.foreign_key.as_deref().ok_or_else(|| {
                            ModelError::Configuration(format!(
                                "{}.{} has no foreign key column",
                                record.entity, relationship.name
                            ))
                        })?;
                        row = row.with_column(column, target);
                    }
                    RelationshipType::ManyToMany => {
                        let pivot = relationship.pivot_config.as_ref().ok_or_else(|| {
                            ModelError::Configuration(format!(
                                "{}.{} has no pivot table",
                                record.entity, relationship.name
                            ))
                        })?;
                        let members = record.collections.get(&relationship.name).cloned().unwrap_or_default();
                        for member in members {
                            self.check_target(staged, &relationship.related_model, member, record, &relationship.name)
                                .await?;
                            changes.links.push(PivotLink {
                                table: pivot.table.clone(),
                                local_id: record.id,
                                foreign_id: member,
                            });
                        }
                    }
                }
            }
            changes.rows.push((metadata.table.clone(), row));
        }

        Ok(changes)
    }

    /// A referenced entity must be staged in this unit of work or already stored
    async fn check_target(
        &self,
        staged: &[EntityRecord],
        entity: &str,
        id: EntityId,
        owner: &EntityRecord,
        association: &str,
    ) -> ModelResult<()> {
        if staged.iter().any(|r| r.entity == entity && r.id == id) {
            return Ok(());
        }
        let table = self.session.database().registry().require(entity)?.table;
        if self.session.database().backend().fetch_row(&table, id).await?.is_some() {
            return Ok(());
        }
        Err(ModelError::Validation(format!(
            "{}#{}.{} references missing {}#{}",
            owner.entity, owner.id, association, entity, id
        )))
    }
}

/// Every reference and collection in a record must be a declared association
fn check_declared(metadata: &EntityMetadata, record: &EntityRecord) -> ModelResult<()> {
    let declared: BTreeSet<&str> = metadata.relationships.iter().map(|r| r.name.as_str()).collect();
    let undeclared = record
        .references
        .keys()
        .chain(record.collections.keys())
        .find(|name| !declared.contains(name.as_str()));
    match undeclared {
        Some(name) => Err(ModelError::Validation(format!(
            "{}#{} sets undeclared association '{}'",
            record.entity, record.id, name
        ))),
        None => Ok(()),
    }
}

impl<'s> Drop for Transaction<'s> {
    /// Automatic cleanup: discard staged entities if the unit of work was never finished
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Transaction dropped without explicit commit or rollback - {} staged entities rolled back",
                self.staged.len()
            );
        }
        self.session.end_transaction();
    }
}
