use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::plan::{QueryNode, QueryPlan};
use crate::{
    backends::{StorageBackend, StoredRow},
    error::{ModelError, OrmResult},
    loading::hydration::{HydratedAssociation, HydratedEntity},
    model::EntityId,
    query::types::JoinType,
    relationships::{RelationshipMetadata, RelationshipType, SchemaRegistry},
};

/// Result of executing a query plan
#[derive(Debug)]
pub struct ExecutionResult {
    /// One hydrated root per result row (collapsed by identity when the plan is distinct)
    pub roots: Vec<HydratedEntity>,
    /// Execution statistics
    pub stats: ExecutionStats,
}

/// Statistics about query plan execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Total execution time
    pub total_duration: Duration,
    /// Number of backend calls
    pub query_count: usize,
    /// Distinct table rows read
    pub rows_fetched: usize,
    /// Join rows after filtering
    pub join_rows: usize,
}

impl ExecutionStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One joined row: an entity id (or nothing) per plan node, in plan order
type JoinRow = Vec<Option<EntityId>>;

/// Executes plans against a storage backend and assembles hydrated entity trees
pub struct PlanExecutor {
    backend: Arc<dyn StorageBackend>,
    registry: SchemaRegistry,
}

impl PlanExecutor {
    /// Create a new plan executor
    pub fn new(backend: Arc<dyn StorageBackend>, registry: SchemaRegistry) -> Self {
        Self { backend, registry }
    }

    /// Execute a plan: build join rows, filter them, then assemble entities
    pub async fn execute_plan(&self, plan: &QueryPlan) -> OrmResult<ExecutionResult> {
        let start_time = Instant::now();
        let mut stats = ExecutionStats::new();
        let nodes: Vec<&QueryNode> = plan.ordered_nodes().collect();
        let slots: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id.as_str(), slot))
            .collect();
        let mut cache = RowCache::default();

        let root = plan.root_node()?;
        let root_ids = self.root_candidates(plan, root, &mut cache, &mut stats).await?;
        let mut rows: Vec<JoinRow> = root_ids
            .into_iter()
            .map(|id| {
                let mut row = vec![None; nodes.len()];
                row[0] = Some(id);
                row
            })
            .collect();

        for (slot, node) in nodes.iter().enumerate().skip(1) {
            let parent_slot = node
                .parent_id
                .as_deref()
                .and_then(|p| slots.get(p).copied())
                .ok_or_else(|| ModelError::Query(format!("Node '{}' has no parent slot", node.id)))?;
            let parent = nodes[parent_slot];
            let relationship = node
                .relationship
                .as_ref()
                .ok_or_else(|| ModelError::Query(format!("Node '{}' has no association", node.id)))?;

            let mut targets: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
            let mut joined = Vec::with_capacity(rows.len());
            for row in rows {
                let matches = match row[parent_slot] {
                    None => Vec::new(),
                    Some(parent_id) => {
                        if !targets.contains_key(&parent_id) {
                            let resolved = self
                                .resolve_targets(parent, node, relationship, parent_id, &mut cache, &mut stats)
                                .await?;
                            targets.insert(parent_id, resolved);
                        }
                        targets.get(&parent_id).cloned().unwrap_or_default()
                    }
                };

                if matches.is_empty() {
                    if node.join_type == JoinType::Left {
                        joined.push(row);
                    }
                    continue;
                }
                for target in matches {
                    let mut next = row.clone();
                    next[slot] = Some(target);
                    joined.push(next);
                }
            }
            rows = joined;
        }

        for (node_id, value) in &plan.filters {
            if let Some(&slot) = slots.get(node_id.as_str()) {
                rows.retain(|row| row[slot] == Some(*value));
            }
        }
        stats.join_rows = rows.len();

        let assembler = Assembler::new(&self.registry, &nodes, &rows, &cache);
        let mut seen = BTreeSet::new();
        let mut roots = Vec::new();
        for row in &rows {
            let Some(root_id) = row[0] else { continue };
            if plan.distinct && !seen.insert(root_id) {
                continue;
            }
            roots.push(assembler.build(0, root_id)?);
        }

        stats.rows_fetched = cache.rows.len();
        stats.total_duration = start_time.elapsed();
        debug!(
            "Executed plan on {}: {} join rows, {} results, {} backend calls",
            root.entity,
            stats.join_rows,
            roots.len(),
            stats.query_count
        );

        Ok(ExecutionResult { roots, stats })
    }

    /// Root ids to start from: the filtered ids when the root is restricted, else every row
    async fn root_candidates(
        &self,
        plan: &QueryPlan,
        root: &QueryNode,
        cache: &mut RowCache,
        stats: &mut ExecutionStats,
    ) -> OrmResult<Vec<EntityId>> {
        let restricted: BTreeSet<EntityId> = plan
            .filters
            .iter()
            .filter(|(node_id, _)| *node_id == plan.root)
            .map(|(_, value)| *value)
            .collect();

        if restricted.is_empty() {
            stats.query_count += 1;
            let rows = self.backend.fetch_all(&root.table).await?;
            let ids = rows.iter().map(|row| row.id).collect();
            for row in rows {
                cache.insert(&root.table, row);
            }
            return Ok(ids);
        }

        let mut ids = Vec::new();
        for id in restricted {
            if self.load_row(&root.table, id, cache, stats).await?.is_some() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Ids reached from `parent_id` through the node's association, all cached
    async fn resolve_targets(
        &self,
        parent: &QueryNode,
        node: &QueryNode,
        relationship: &RelationshipMetadata,
        parent_id: EntityId,
        cache: &mut RowCache,
        stats: &mut ExecutionStats,
    ) -> OrmResult<Vec<EntityId>> {
        let ids = match relationship.relationship_type {
            RelationshipType::BelongsTo => {
                let column = relationship.foreign_key.as_deref().unwrap_or_default();
                cache
                    .get(&parent.table, parent_id)
                    .and_then(|row| row.column(column))
                    .into_iter()
                    .collect()
            }
            RelationshipType::ManyToMany => {
                let pivot = relationship.pivot_config.as_ref().ok_or_else(|| {
                    ModelError::Configuration(format!("{} has no pivot table", node.id))
                })?;
                stats.query_count += 1;
                self.backend.fetch_pivot(&pivot.table, parent_id).await?
            }
        };

        for id in &ids {
            if self.load_row(&node.table, *id, cache, stats).await?.is_none() {
                return Err(ModelError::Validation(format!(
                    "{}#{} referenced through '{}' does not exist",
                    node.entity,
                    id,
                    node.relative_path()
                )));
            }
        }
        Ok(ids)
    }

    async fn load_row(
        &self,
        table: &str,
        id: EntityId,
        cache: &mut RowCache,
        stats: &mut ExecutionStats,
    ) -> OrmResult<Option<StoredRow>> {
        if let Some(row) = cache.get(table, id) {
            return Ok(Some(row.clone()));
        }
        stats.query_count += 1;
        let row = self.backend.fetch_row(table, id).await?;
        if let Some(row) = &row {
            cache.insert(table, row.clone());
        }
        Ok(row)
    }
}

#[derive(Debug, Default)]
struct RowCache {
    rows: HashMap<(String, EntityId), StoredRow>,
}

impl RowCache {
    fn get(&self, table: &str, id: EntityId) -> Option<&StoredRow> {
        self.rows.get(&(table.to_string(), id))
    }

    fn insert(&mut self, table: &str, row: StoredRow) {
        self.rows.insert((table.to_string(), row.id), row);
    }
}

/// Builds hydrated trees from filtered join rows
struct Assembler<'a> {
    registry: &'a SchemaRegistry,
    nodes: &'a [&'a QueryNode],
    cache: &'a RowCache,
    /// (child slot, parent id) -> child ids present in the rows
    children: HashMap<(usize, EntityId), BTreeSet<EntityId>>,
}

impl<'a> Assembler<'a> {
    fn new(
        registry: &'a SchemaRegistry,
        nodes: &'a [&'a QueryNode],
        rows: &[JoinRow],
        cache: &'a RowCache,
    ) -> Self {
        let mut parent_slots = Vec::with_capacity(nodes.len());
        for node in nodes {
            let parent_slot = node
                .parent_id
                .as_deref()
                .and_then(|p| nodes.iter().position(|n| n.id == p));
            parent_slots.push(parent_slot);
        }

        let mut children: HashMap<(usize, EntityId), BTreeSet<EntityId>> = HashMap::new();
        for row in rows {
            for (slot, parent_slot) in parent_slots.iter().enumerate() {
                if let (Some(parent_slot), Some(child_id)) = (parent_slot, row[slot]) {
                    if let Some(parent_id) = row[*parent_slot] {
                        children.entry((slot, parent_id)).or_default().insert(child_id);
                    }
                }
            }
        }

        Self {
            registry,
            nodes,
            cache,
            children,
        }
    }

    fn build(&self, slot: usize, id: EntityId) -> OrmResult<HydratedEntity> {
        let node = self.nodes[slot];
        let metadata = self.registry.require(&node.entity)?;
        let row = self.cache.get(&node.table, id).ok_or_else(|| {
            ModelError::Query(format!("{}#{} missing from row cache", node.entity, id))
        })?;

        let mut entity = HydratedEntity::new(&node.entity, id);
        for relationship in &metadata.relationships {
            let fetched = self.nodes.iter().position(|child| {
                child.fetch
                    && child.parent_id.as_deref() == Some(node.id.as_str())
                    && child.association() == Some(relationship.name.as_str())
            });
            let association = self.association(node, row, relationship, fetched)?;
            entity = entity.with_association(relationship.name.clone(), association);
        }
        Ok(entity)
    }

    fn association(
        &self,
        node: &QueryNode,
        row: &StoredRow,
        relationship: &RelationshipMetadata,
        fetched: Option<usize>,
    ) -> OrmResult<HydratedAssociation> {
        let members = fetched.map(|slot| {
            (
                slot,
                self.children
                    .get(&(slot, row.id))
                    .cloned()
                    .unwrap_or_default(),
            )
        });

        match relationship.relationship_type {
            RelationshipType::BelongsTo => {
                let column = relationship.foreign_key.as_deref().unwrap_or_default();
                let target_id = row.column(column).ok_or_else(|| {
                    ModelError::Validation(format!(
                        "{}#{} has no value for required association '{}'",
                        node.entity, row.id, relationship.name
                    ))
                })?;
                let target = match members {
                    Some((slot, ids)) => {
                        let child_id = ids.into_iter().next().ok_or_else(|| {
                            ModelError::Validation(format!(
                                "{}#{}.{} was fetched but has no target",
                                node.entity, row.id, relationship.name
                            ))
                        })?;
                        Some(Box::new(self.build(slot, child_id)?))
                    }
                    None => None,
                };
                Ok(HydratedAssociation::Reference {
                    id: target_id,
                    target,
                })
            }
            RelationshipType::ManyToMany => match members {
                Some((slot, ids)) => {
                    let built = ids
                        .into_iter()
                        .map(|child_id| self.build(slot, child_id))
                        .collect::<OrmResult<Vec<_>>>()?;
                    Ok(HydratedAssociation::Collection(Some(built)))
                }
                None => Ok(HydratedAssociation::Collection(None)),
            },
        }
    }
}
