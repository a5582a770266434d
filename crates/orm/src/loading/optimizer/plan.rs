use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ModelError, OrmError, OrmResult},
    loading::entity_graph::{FetchPlan, GraphSemantic},
    model::EntityId,
    query::{
        parser::{ConditionValue, ParsedQuery},
        types::JoinType,
        QueryBuilder,
    },
    relationships::{RelationshipMetadata, RelationshipType, SchemaRegistry},
};

/// Where a plan node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeSource {
    /// The queried entity itself
    Root,
    /// Named by an entity graph
    Graph,
    /// Declared `FetchType::Eager` on the association
    EagerDefault,
    /// A `join` clause of a query
    QueryJoin,
}

/// Represents a node in the query execution plan
///
/// A node is identified by its full association path from the root
/// (`User.department.company`), never by the entity type it targets.
#[derive(Debug, Clone)]
pub struct QueryNode {
    /// Path key, unique within the plan
    pub id: String,
    /// SQL alias used when rendering the plan
    pub alias: String,
    /// Entity produced at this node
    pub entity: String,
    /// Table to read
    pub table: String,
    /// Association from the parent (None for root)
    pub relationship: Option<RelationshipMetadata>,
    /// Parent node ID (None for root)
    pub parent_id: Option<String>,
    /// Child node IDs
    pub children: Vec<String>,
    /// Depth in the relationship tree
    pub depth: usize,
    /// Join used to attach this node to its parent
    pub join_type: JoinType,
    /// Whether the association is materialized on the parent
    pub fetch: bool,
    /// Origin of the node
    pub source: NodeSource,
}

impl QueryNode {
    /// Create a root node (no parent)
    pub fn root(entity: &str, table: &str) -> Self {
        Self {
            id: entity.to_string(),
            alias: sql_alias(entity, 0),
            entity: entity.to_string(),
            table: table.to_string(),
            relationship: None,
            parent_id: None,
            children: Vec::new(),
            depth: 0,
            join_type: JoinType::Left,
            fetch: true,
            source: NodeSource::Root,
        }
    }

    /// Create a child node for an association of `parent`
    pub fn child(parent: &QueryNode, relationship: RelationshipMetadata, table: &str) -> Self {
        Self {
            id: format!("{}.{}", parent.id, relationship.name),
            alias: String::new(),
            entity: relationship.related_model.clone(),
            table: table.to_string(),
            relationship: Some(relationship),
            parent_id: Some(parent.id.clone()),
            children: Vec::new(),
            depth: parent.depth + 1,
            join_type: JoinType::Left,
            fetch: true,
            source: NodeSource::Graph,
        }
    }

    /// Association name on the parent
    pub fn association(&self) -> Option<&str> {
        self.relationship.as_ref().map(|r| r.name.as_str())
    }

    /// Check if this node is a root node
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this node is a leaf node
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check if this node represents a collection relationship
    pub fn is_collection(&self) -> bool {
        self.relationship
            .as_ref()
            .map(|r| r.is_collection())
            .unwrap_or(false)
    }

    /// Path relative to the root (`department.company`), empty for the root
    pub fn relative_path(&self) -> &str {
        match self.id.find('.') {
            Some(idx) => &self.id[idx + 1..],
            None => "",
        }
    }
}

/// Hibernate-style alias: lowercase entity name, truncated, plus a counter
fn sql_alias(name: &str, counter: usize) -> String {
    let base: String = name
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(10)
        .collect::<String>()
        .to_lowercase();
    format!("{}{}_", base, counter)
}

/// Query execution plan for one root entity
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// All nodes in the plan, keyed by path
    pub nodes: HashMap<String, QueryNode>,
    /// Node IDs with every parent before its children
    pub order: Vec<String>,
    /// Root node ID
    pub root: String,
    /// `(node id, required id)` restrictions
    pub filters: Vec<(String, EntityId)>,
    /// Collapse duplicate roots by identity
    pub distinct: bool,
    /// Maximum depth of the plan
    pub max_depth: usize,
}

impl QueryPlan {
    /// Create a plan holding only its root node
    pub fn new(root: QueryNode) -> Self {
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            nodes,
            order: vec![root_id.clone()],
            root: root_id,
            filters: Vec::new(),
            distinct: false,
            max_depth: 0,
        }
    }

    /// Add a node to the plan, merging with an existing node on the same path
    pub fn add_node(&mut self, mut node: QueryNode) -> String {
        if let Some(existing) = self.nodes.get_mut(&node.id) {
            existing.fetch |= node.fetch;
            existing.join_type = existing.join_type.combine(node.join_type);
            return existing.id.clone();
        }

        self.max_depth = self.max_depth.max(node.depth);
        node.alias = sql_alias(&node.entity, self.order.len());

        if let Some(parent_id) = &node.parent_id {
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                if !parent.children.contains(&node.id) {
                    parent.children.push(node.id.clone());
                }
            }
        }

        let id = node.id.clone();
        self.order.push(id.clone());
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Restrict rows to those where `node_id` holds `value`
    pub fn add_filter(&mut self, node_id: &str, value: EntityId) {
        self.filters.push((node_id.to_string(), value));
    }

    /// The root node
    pub fn root_node(&self) -> OrmResult<&QueryNode> {
        self.node(&self.root)
    }

    /// Look up a node by ID
    pub fn node(&self, id: &str) -> OrmResult<&QueryNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| OrmError::Query(format!("Plan has no node '{}'", id)))
    }

    /// Nodes in execution order
    pub fn ordered_nodes(&self) -> impl Iterator<Item = &QueryNode> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    /// Paths (relative to the root) of every association materialized by this plan
    pub fn fetched_paths(&self) -> Vec<String> {
        self.ordered_nodes()
            .filter(|n| !n.is_root() && n.fetch)
            .map(|n| n.relative_path().to_string())
            .collect()
    }

    /// Validate the query plan for consistency
    pub fn validate(&self) -> OrmResult<()> {
        if self.order.len() != self.nodes.len() {
            return Err(OrmError::Query(
                "Plan order does not cover every node".into(),
            ));
        }

        let mut seen = HashSet::new();
        for id in &self.order {
            let node = self.node(id)?;
            match &node.parent_id {
                None if *id != self.root => {
                    return Err(OrmError::Query(format!("Node '{}' has no parent", id)));
                }
                None => {}
                Some(parent_id) => {
                    if !seen.contains(parent_id.as_str()) {
                        return Err(OrmError::Query(format!(
                            "Parent node '{}' not found before node '{}'",
                            parent_id, id
                        )));
                    }
                    let parent = self.node(parent_id)?;
                    if node.fetch && !parent.fetch {
                        return Err(ModelError::InvalidPlan(format!(
                            "Association '{}' is fetched but its owner '{}' is not",
                            node.relative_path(),
                            parent.relative_path()
                        )));
                    }
                }
            }
            for child_id in &node.children {
                if !self.nodes.contains_key(child_id) {
                    return Err(OrmError::Query(format!(
                        "Child node '{}' not found for node '{}'",
                        child_id, id
                    )));
                }
            }
            seen.insert(id.as_str());
        }

        for (node_id, _) in &self.filters {
            self.node(node_id)?;
        }

        Ok(())
    }

    /// Render the SQL statement this plan corresponds to
    pub fn to_sql(&self) -> String {
        self.to_query_builder().to_sql()
    }

    /// Build the SELECT this plan corresponds to
    pub fn to_query_builder(&self) -> QueryBuilder {
        let mut builder = QueryBuilder::new();
        let Some(root) = self.nodes.get(&self.root) else {
            return builder;
        };

        builder = builder
            .select(
                self.ordered_nodes()
                    .filter(|n| n.fetch)
                    .map(|n| format!("{}.id", n.alias)),
            )
            .from(&root.table, &root.alias);
        if self.distinct {
            builder = builder.distinct();
        }

        let mut pivot_counter = self.order.len();
        for node in self.ordered_nodes().skip(1) {
            let (Some(parent), Some(relationship)) = (
                node.parent_id.as_ref().and_then(|p| self.nodes.get(p)),
                node.relationship.as_ref(),
            ) else {
                continue;
            };

            match (relationship.relationship_type, &relationship.foreign_key, &relationship.pivot_config) {
                (RelationshipType::BelongsTo, Some(fk), _) => {
                    builder = builder.join_with(
                        node.join_type,
                        &node.table,
                        &node.alias,
                        &format!("{}.{}", parent.alias, fk),
                        &format!("{}.id", node.alias),
                    );
                }
                (RelationshipType::ManyToMany, _, Some(pivot)) => {
                    let pivot_alias = sql_alias(&pivot.table, pivot_counter);
                    pivot_counter += 1;
                    builder = builder
                        .join_with(
                            node.join_type,
                            &pivot.table,
                            &pivot_alias,
                            &format!("{}.id", parent.alias),
                            &format!("{}.{}", pivot_alias, pivot.local_key),
                        )
                        .join_with(
                            node.join_type,
                            &node.table,
                            &node.alias,
                            &format!("{}.{}", pivot_alias, pivot.foreign_key),
                            &format!("{}.id", node.alias),
                        );
                }
                _ => {}
            }
        }

        for (node_id, value) in &self.filters {
            if let Some(node) = self.nodes.get(node_id) {
                builder = builder.where_eq(&format!("{}.id", node.alias), *value);
            }
        }

        builder
    }

    /// Get plan statistics
    pub fn statistics(&self) -> PlanStatistics {
        let joins = self.nodes.values().filter(|n| !n.is_root());
        PlanStatistics {
            total_nodes: self.nodes.len(),
            fetch_joins: joins.clone().filter(|n| n.fetch).count(),
            plain_joins: joins.clone().filter(|n| !n.fetch).count(),
            collection_joins: joins.clone().filter(|n| n.is_collection()).count(),
            eager_defaults: joins.filter(|n| n.source == NodeSource::EagerDefault).count(),
            leaf_nodes: self.nodes.values().filter(|n| n.is_leaf()).count(),
            max_depth: self.max_depth,
        }
    }
}

/// Statistics about a query plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatistics {
    pub total_nodes: usize,
    pub fetch_joins: usize,
    pub plain_joins: usize,
    pub collection_joins: usize,
    pub eager_defaults: usize,
    pub leaf_nodes: usize,
    pub max_depth: usize,
}

/// Turns entity graphs and parsed queries into path-keyed plans
#[derive(Debug, Clone)]
pub struct QueryPlanner<'a> {
    registry: &'a SchemaRegistry,
    max_fetch_depth: usize,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(registry: &'a SchemaRegistry, max_fetch_depth: usize) -> Self {
        Self {
            registry,
            max_fetch_depth,
        }
    }

    /// Plan a lookup by id under an optional entity graph
    pub fn plan_find(
        &self,
        entity: &str,
        id: EntityId,
        graph: Option<&FetchPlan>,
        semantic: GraphSemantic,
    ) -> OrmResult<QueryPlan> {
        let metadata = self.registry.require(entity)?;
        let mut plan = QueryPlan::new(QueryNode::root(entity, &metadata.table));
        plan.add_filter(entity, id);

        if let Some(graph) = graph {
            if graph.depth() > self.max_fetch_depth {
                return Err(ModelError::InvalidPlan(format!(
                    "Entity graph depth {} exceeds max_fetch_depth {}",
                    graph.depth(),
                    self.max_fetch_depth
                )));
            }
            let root = plan.root.clone();
            self.add_graph_nodes(&mut plan, &root, graph)?;
        }

        // A fetch graph turns every attribute outside it lazy
        let use_declared = graph.is_none() || semantic == GraphSemantic::Load;
        if use_declared {
            self.add_eager_defaults(&mut plan)?;
        }

        plan.validate()?;
        debug!(
            "Planned find {}#{} ({} semantic): {:?}",
            entity,
            id,
            semantic,
            plan.fetched_paths()
        );
        Ok(plan)
    }

    /// Plan a parsed query with its parameters already bound
    pub fn plan_query(
        &self,
        query: &ParsedQuery,
        parameters: &HashMap<String, EntityId>,
    ) -> OrmResult<QueryPlan> {
        let metadata = self.registry.require(&query.entity)?;
        let mut plan = QueryPlan::new(QueryNode::root(&query.entity, &metadata.table));
        plan.distinct = query.distinct;

        let mut aliases: HashMap<&str, String> = HashMap::new();
        aliases.insert(query.root_alias.as_str(), plan.root.clone());

        for join in &query.joins {
            let parent_id = aliases.get(join.parent_alias.as_str()).ok_or_else(|| {
                OrmError::Query(format!("Unknown alias '{}'", join.parent_alias))
            })?;
            let parent = plan.node(parent_id)?.clone();
            let relationship = self.registry.relationship(&parent.entity, &join.association)?;
            let table = self.registry.require(&relationship.related_model)?.table;

            let mut node = QueryNode::child(&parent, relationship, &table);
            node.join_type = join.join_type;
            node.fetch = join.fetch;
            node.source = NodeSource::QueryJoin;
            match &join.alias {
                // Each aliased plain join is its own row source
                Some(alias) if !join.fetch => node.id = format!("{}#{}", node.id, alias),
                _ => {}
            }
            if join.fetch && plan.nodes.get(&node.id).map_or(false, |n| n.fetch) {
                return Err(OrmError::Query(format!(
                    "Association '{}' is join fetched twice",
                    node.relative_path()
                )));
            }
            let id = plan.add_node(node);

            if let Some(alias) = &join.alias {
                aliases.insert(alias.as_str(), id);
            }
        }

        for condition in &query.conditions {
            let node_id = aliases.get(condition.alias.as_str()).ok_or_else(|| {
                OrmError::Query(format!("Unknown alias '{}'", condition.alias))
            })?;
            let value = match &condition.value {
                ConditionValue::Literal(value) => *value,
                ConditionValue::Parameter(name) => *parameters.get(name).ok_or_else(|| {
                    OrmError::Query(format!("No value bound for parameter ':{}'", name))
                })?,
            };
            plan.add_filter(node_id, value);
        }

        self.add_eager_defaults(&mut plan)?;
        plan.validate()?;
        debug!(
            "Planned query on {} (distinct: {}): {:?}",
            query.entity,
            query.distinct,
            plan.fetched_paths()
        );
        Ok(plan)
    }

    fn add_graph_nodes(&self, plan: &mut QueryPlan, parent_id: &str, graph: &FetchPlan) -> OrmResult<()> {
        for fetch_node in graph.nodes() {
            let parent = plan.node(parent_id)?.clone();
            let relationship = self
                .registry
                .relationship(&parent.entity, &fetch_node.name)
                .map_err(|_| {
                    ModelError::InvalidPlan(format!(
                        "{} has no association named '{}' (at '{}')",
                        parent.entity,
                        fetch_node.name,
                        join_path(parent.relative_path(), &fetch_node.name)
                    ))
                })?;
            let table = self.registry.require(&relationship.related_model)?.table;
            let id = plan.add_node(QueryNode::child(&parent, relationship, &table));

            if let Some(subgraph) = &fetch_node.subgraph {
                self.add_graph_nodes(plan, &id, subgraph)?;
            }
        }
        Ok(())
    }

    /// Join associations declared eager under every fetched node, transitively
    fn add_eager_defaults(&self, plan: &mut QueryPlan) -> OrmResult<()> {
        let mut pending: Vec<String> = plan.order.clone();

        while let Some(node_id) = pending.pop() {
            let node = plan.node(&node_id)?.clone();
            if !node.fetch {
                continue;
            }
            let metadata = self.registry.require(&node.entity)?;

            for relationship in metadata.relationships.iter().filter(|r| r.is_eager()) {
                let already_fetched = node
                    .children
                    .iter()
                    .filter_map(|id| plan.nodes.get(id))
                    .any(|child| child.fetch && child.association() == Some(relationship.name.as_str()));
                if already_fetched {
                    continue;
                }
                let child_id = format!("{}.{}", node.id, relationship.name);
                if node.depth + 1 > self.max_fetch_depth {
                    debug!(
                        "Eager fetch of '{}' skipped: max_fetch_depth {} reached",
                        child_id, self.max_fetch_depth
                    );
                    continue;
                }
                // An unaliased plain join on an eager association still materializes it
                if let Some(existing) = plan.nodes.get_mut(&child_id) {
                    existing.fetch = true;
                    pending.push(child_id);
                    continue;
                }
                let table = self.registry.require(&relationship.related_model)?.table;
                let mut child = QueryNode::child(&node, relationship.clone(), &table);
                child.source = NodeSource::EagerDefault;
                pending.push(plan.add_node(child));
            }
        }

        Ok(())
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{EntityMetadata, FetchType, PivotConfig};

    fn registry() -> SchemaRegistry {
        let registry = SchemaRegistry::new();
        registry.register(EntityMetadata::new("Company")).unwrap();
        registry
            .register(EntityMetadata::new("Department").with_relationship(
                RelationshipMetadata::belongs_to("company", "Company", "company_id"),
            ))
            .unwrap();
        registry
            .register(
                EntityMetadata::new("User")
                    .with_relationship(RelationshipMetadata::belongs_to(
                        "department",
                        "Department",
                        "department_id",
                    ))
                    .with_relationship(RelationshipMetadata::many_to_many(
                        "related_departments",
                        "Department",
                        PivotConfig::new("User_Department", "User_id", "relatedDepartments_id"),
                    )),
            )
            .unwrap();
        registry
    }

    fn both_branches() -> FetchPlan {
        FetchPlan::new()
            .add_subgraph("department", |g| g.add_attribute_nodes(["company"]))
            .add_subgraph("related_departments", |g| g.add_attribute_nodes(["company"]))
    }

    #[test]
    fn test_nodes_are_keyed_by_path() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let plan = planner
            .plan_find("User", 1, Some(&both_branches()), GraphSemantic::Fetch)
            .unwrap();

        assert!(plan.nodes.contains_key("User.department.company"));
        assert!(plan.nodes.contains_key("User.related_departments.company"));
        assert_eq!(plan.nodes.len(), 5);
        assert_eq!(plan.node("User.related_departments.company").unwrap().entity, "Company");

        let stats = plan.statistics();
        assert_eq!(stats.fetch_joins, 4);
        assert_eq!(stats.collection_joins, 1);
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn test_single_branch_leaves_sibling_out() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let graph = FetchPlan::new()
            .add_subgraph("related_departments", |g| g.add_attribute_nodes(["company"]));
        let plan = planner
            .plan_find("User", 1, Some(&graph), GraphSemantic::Fetch)
            .unwrap();

        assert_eq!(
            plan.fetched_paths(),
            vec!["related_departments", "related_departments.company"]
        );
        assert!(!plan.nodes.contains_key("User.department"));
    }

    #[test]
    fn test_unknown_association_is_invalid_plan() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let graph = FetchPlan::new().add_subgraph("department", |g| g.add_attribute_nodes(["owner"]));
        let err = planner
            .plan_find("User", 1, Some(&graph), GraphSemantic::Fetch)
            .unwrap_err();
        assert!(err.is_invalid_plan());
        assert!(err.to_string().contains("department.owner"));
    }

    #[test]
    fn test_graph_deeper_than_limit_is_invalid_plan() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 1);
        let err = planner
            .plan_find("User", 1, Some(&both_branches()), GraphSemantic::Fetch)
            .unwrap_err();
        assert!(err.is_invalid_plan());
    }

    #[test]
    fn test_eager_defaults_follow_semantic() {
        let registry = SchemaRegistry::new();
        registry.register(EntityMetadata::new("Owner")).unwrap();
        registry.register(EntityMetadata::new("Kind")).unwrap();
        registry
            .register(
                EntityMetadata::new("Pet")
                    .with_relationship(
                        RelationshipMetadata::belongs_to("owner", "Owner", "owner_id")
                            .with_fetch(FetchType::Eager),
                    )
                    .with_relationship(RelationshipMetadata::belongs_to("kind", "Kind", "kind_id")),
            )
            .unwrap();
        let planner = QueryPlanner::new(&registry, 5);
        let graph = FetchPlan::new().add_attribute_nodes(["kind"]);

        let fetch = planner.plan_find("Pet", 1, Some(&graph), GraphSemantic::Fetch).unwrap();
        assert_eq!(fetch.fetched_paths(), vec!["kind"]);

        let load = planner.plan_find("Pet", 1, Some(&graph), GraphSemantic::Load).unwrap();
        let mut paths = load.fetched_paths();
        paths.sort();
        assert_eq!(paths, vec!["kind", "owner"]);
        assert_eq!(load.statistics().eager_defaults, 1);

        let plain = planner.plan_find("Pet", 1, None, GraphSemantic::Fetch).unwrap();
        assert_eq!(plain.fetched_paths(), vec!["owner"]);
    }

    #[test]
    fn test_query_plan_and_sql() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let query = ParsedQuery::parse(
            "select distinct u from User u join fetch u.department d left join fetch u.related_departments rd where u.id = :id",
        )
        .unwrap();
        let mut params = HashMap::new();
        params.insert("id".to_string(), 1);
        let plan = planner.plan_query(&query, &params).unwrap();

        assert!(plan.distinct);
        assert_eq!(plan.filters, vec![("User".to_string(), 1)]);
        assert_eq!(plan.node("User.department").unwrap().join_type, JoinType::Inner);

        let sql = plan.to_sql();
        assert!(sql.starts_with("SELECT DISTINCT user0_.id, department1_.id, department2_.id FROM User user0_"));
        assert!(sql.contains("INNER JOIN Department department1_ ON user0_.department_id = department1_.id"));
        assert!(sql.contains("LEFT OUTER JOIN User_Department userdepart3_ ON user0_.id = userdepart3_.User_id"));
        assert!(sql.contains(
            "LEFT OUTER JOIN Department department2_ ON userdepart3_.relatedDepartments_id = department2_.id"
        ));
        assert!(sql.ends_with("WHERE user0_.id = 1"));
    }

    #[test]
    fn test_unbound_parameter_is_query_error() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let query = ParsedQuery::parse("select u from User u where u.id = :id").unwrap();
        assert!(matches!(
            planner.plan_query(&query, &HashMap::new()),
            Err(ModelError::Query(_))
        ));
    }

    #[test]
    fn test_aliased_plain_joins_get_their_own_nodes() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let query = ParsedQuery::parse(
            "select u from User u join u.related_departments r1 join u.related_departments r2 \
             where r1.id = 21 and r2.id = 22",
        )
        .unwrap();
        let plan = planner.plan_query(&query, &HashMap::new()).unwrap();

        assert!(plan.nodes.contains_key("User.related_departments#r1"));
        assert!(plan.nodes.contains_key("User.related_departments#r2"));
        assert!(!plan.nodes.contains_key("User.related_departments"));
        assert_eq!(
            plan.filters,
            vec![
                ("User.related_departments#r1".to_string(), 21),
                ("User.related_departments#r2".to_string(), 22)
            ]
        );
        assert!(plan.fetched_paths().is_empty());
        assert_eq!(plan.statistics().plain_joins, 2);
    }

    #[test]
    fn test_duplicate_fetch_join_is_rejected() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let query =
            ParsedQuery::parse("select u from User u join fetch u.department d1 join fetch u.department d2")
                .unwrap();
        assert!(matches!(
            planner.plan_query(&query, &HashMap::new()),
            Err(ModelError::Query(_))
        ));
    }

    #[test]
    fn test_plain_join_on_eager_association_is_fetched() {
        let registry = SchemaRegistry::new();
        registry.register(EntityMetadata::new("Owner")).unwrap();
        registry
            .register(EntityMetadata::new("Pet").with_relationship(
                RelationshipMetadata::belongs_to("owner", "Owner", "owner_id").with_fetch(FetchType::Eager),
            ))
            .unwrap();
        let planner = QueryPlanner::new(&registry, 5);

        let unaliased = ParsedQuery::parse("select p from Pet p join p.owner").unwrap();
        let plan = planner.plan_query(&unaliased, &HashMap::new()).unwrap();
        let owner = plan.node("Pet.owner").unwrap();
        assert!(owner.fetch);
        assert_eq!(owner.join_type, JoinType::Inner);
        assert_eq!(plan.nodes.len(), 2);

        let aliased = ParsedQuery::parse("select p from Pet p join p.owner o where o.id = 4").unwrap();
        let plan = planner.plan_query(&aliased, &HashMap::new()).unwrap();
        assert!(!plan.node("Pet.owner#o").unwrap().fetch);
        assert!(plan.node("Pet.owner").unwrap().fetch);
        assert_eq!(plan.fetched_paths(), vec!["owner"]);
    }

    #[test]
    fn test_fetch_under_plain_join_is_rejected() {
        let registry = registry();
        let planner = QueryPlanner::new(&registry, 5);
        let query =
            ParsedQuery::parse("select u from User u join u.department d join fetch d.company").unwrap();
        let err = planner.plan_query(&query, &HashMap::new()).unwrap_err();
        assert!(err.is_invalid_plan());
    }
}
