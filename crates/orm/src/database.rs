//! Database - persistence unit entry point
//!
//! A `Database` owns the storage backend, the schema registry and the engine
//! configuration. It hands out sessions and the load-state introspection
//! utility.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backends::{MemoryBackend, StorageBackend};
use crate::config::OrmConfig;
use crate::error::ModelResult;
use crate::model::Model;
use crate::relationships::{LoadState, SchemaRegistry};
use crate::session::Session;

struct DatabaseInner {
    backend: Arc<dyn StorageBackend>,
    registry: SchemaRegistry,
    config: OrmConfig,
}

/// Handle to a persistence unit. Cloning is cheap and shares the same storage.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("persistence_unit", &self.inner.config.persistence_unit)
            .field("entities", &self.inner.registry.entity_names())
            .finish()
    }
}

impl Database {
    /// Create a database over the given backend
    pub fn new(config: OrmConfig, backend: Arc<dyn StorageBackend>) -> ModelResult<Self> {
        config.validate()?;
        info!(
            "Opening persistence unit '{}' (max_fetch_depth: {}, graph semantic: {})",
            config.persistence_unit, config.max_fetch_depth, config.default_graph_semantic
        );
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                backend,
                registry: SchemaRegistry::new(),
                config,
            }),
        })
    }

    /// Create a database backed by process memory
    pub fn in_memory(config: OrmConfig) -> ModelResult<Self> {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    /// Register an entity type
    pub fn register<M: Model>(&self) -> ModelResult<()> {
        self.inner.registry.register(M::metadata())?;
        debug!("Registered entity {}", M::entity_name());
        Ok(())
    }

    /// Open a new session. Fails if a registered association targets an unregistered entity.
    pub fn create_session(&self) -> ModelResult<Session> {
        self.inner.registry.validate()?;
        Ok(Session::new(self.clone()))
    }

    /// Load-state introspection
    pub fn persistence_unit_util(&self) -> PersistenceUnitUtil {
        PersistenceUnitUtil
    }

    /// Number of stored rows for an entity
    pub async fn count<M: Model>(&self) -> ModelResult<usize> {
        let metadata = self.inner.registry.require(M::entity_name())?;
        self.inner.backend.row_count(&metadata.table).await
    }

    /// Engine configuration
    pub fn config(&self) -> &OrmConfig {
        &self.inner.config
    }

    /// Registered schema
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    pub(crate) fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.inner.backend)
    }
}

/// Reports whether associations of an entity instance were materialized.
/// Never triggers a fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceUnitUtil;

impl PersistenceUnitUtil {
    /// True if the association holds materialized data. Unknown associations report false.
    pub fn is_loaded<M: Model>(&self, entity: &M, association: &str) -> bool {
        self.load_state(entity, association)
            .map_or(false, LoadState::is_loaded)
    }

    /// Load state of an association, `None` if the entity does not declare it
    pub fn load_state<M: Model>(&self, entity: &M, association: &str) -> Option<LoadState> {
        entity.load_state(association)
    }
}
