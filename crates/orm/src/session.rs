//! Sessions - the persistence context callers work through
//!
//! A session runs finds and queries and opens units of work. It holds no
//! identity map: every find materializes a fresh entity tree, so load state
//! belongs to the path an instance was reached through.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::loading::{EntityGraph, GraphSemantic, HydratedEntity, PlanExecutor, QueryPlan, QueryPlanner};
use crate::model::{EntityId, Model};
use crate::query::TypedQuery;
use crate::transaction::Transaction;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Options for `Session::find_with`
#[derive(Debug)]
pub struct FindOptions<M> {
    graph: Option<EntityGraph<M>>,
    semantic: Option<GraphSemantic>,
}

impl<M> Clone for FindOptions<M> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            semantic: self.semantic,
        }
    }
}

impl<M: Model> Default for FindOptions<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> FindOptions<M> {
    /// No graph: declared fetch types apply
    pub fn new() -> Self {
        Self {
            graph: None,
            semantic: None,
        }
    }

    /// Use `graph` with the configured default semantic
    pub fn with_graph(mut self, graph: EntityGraph<M>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Use `graph` as a fetch graph: everything outside it stays deferred
    pub fn fetch_graph(graph: EntityGraph<M>) -> Self {
        Self {
            graph: Some(graph),
            semantic: Some(GraphSemantic::Fetch),
        }
    }

    /// Use `graph` as a load graph: everything outside it keeps its declared fetch type
    pub fn load_graph(graph: EntityGraph<M>) -> Self {
        Self {
            graph: Some(graph),
            semantic: Some(GraphSemantic::Load),
        }
    }

    pub fn graph(&self) -> Option<&EntityGraph<M>> {
        self.graph.as_ref()
    }

    pub fn semantic(&self) -> Option<GraphSemantic> {
        self.semantic
    }
}

/// A persistence session
pub struct Session {
    database: Database,
    id: u64,
    transaction_active: AtomicBool,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transaction_active", &self.transaction_active.load(Ordering::SeqCst))
            .finish()
    }
}

impl Session {
    pub(crate) fn new(database: Database) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst);
        debug!("Session {} opened on '{}'", id, database.config().persistence_unit);
        Self {
            database,
            id,
            transaction_active: AtomicBool::new(false),
            closed: false,
        }
    }

    /// Session identifier, unique within the process
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The database this session belongs to
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Begin a unit of work. A session runs at most one at a time.
    pub fn begin(&self) -> ModelResult<Transaction<'_>> {
        if self
            .transaction_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ModelError::Session(format!(
                "Session {} already has an active transaction",
                self.id
            )));
        }
        Ok(Transaction::new(self))
    }

    pub(crate) fn end_transaction(&self) {
        self.transaction_active.store(false, Ordering::SeqCst);
    }

    /// Find an entity by id. With a graph, the configured default semantic applies.
    pub async fn find<M: Model>(&self, id: EntityId, graph: Option<&EntityGraph<M>>) -> ModelResult<M> {
        let mut options = FindOptions::new();
        if let Some(graph) = graph {
            options = options.with_graph(graph.clone());
        }
        self.find_with(id, &options).await
    }

    /// Find an entity by id with explicit options
    pub async fn find_with<M: Model>(&self, id: EntityId, options: &FindOptions<M>) -> ModelResult<M> {
        let semantic = options
            .semantic()
            .unwrap_or(self.database.config().default_graph_semantic);
        let plan = self.planner().plan_find(
            M::entity_name(),
            id,
            options.graph().map(EntityGraph::plan),
            semantic,
        )?;

        let root = self
            .execute(&plan)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::not_found(M::entity_name(), id))?;
        root.into_model::<M>()
    }

    /// Create a typed query from query text
    pub fn create_query<M: Model>(&self, text: &str) -> ModelResult<TypedQuery<'_, M>> {
        TypedQuery::new(self, text)
    }

    /// Close the session
    pub fn close(mut self) {
        self.closed = true;
        debug!("Session {} closed", self.id);
    }

    pub(crate) fn planner(&self) -> QueryPlanner<'_> {
        QueryPlanner::new(self.database.registry(), self.database.config().max_fetch_depth)
    }

    /// Run a plan and return the hydrated roots
    pub(crate) async fn execute(&self, plan: &QueryPlan) -> ModelResult<Vec<HydratedEntity>> {
        if self.database.config().show_sql {
            let (sql, params) = plan.to_query_builder().to_sql_with_params();
            debug!(target: "graphfetch_orm::sql", "{} {:?}", sql, params);
        }

        let executor = PlanExecutor::new(self.database.backend(), self.database.registry().clone());
        let result = executor.execute_plan(plan).await?;
        debug!(
            "Session {}: {} rows fetched in {:?}",
            self.id, result.stats.rows_fetched, result.stats.total_duration
        );
        Ok(result.roots)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Session {} dropped without close()", self.id);
        }
    }
}
