//! Entity Graphs - declarative fetch plans
//!
//! A fetch plan is a tree: each node names an association and may carry a
//! nested plan for the association's target. Nodes are addressed by their
//! position in the tree, so two branches that reach the same target type are
//! independent of each other.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::{ModelError, ModelResult};
use crate::model::Model;

/// How associations outside the graph are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GraphSemantic {
    /// Associations outside the graph are lazy (`javax.persistence.fetchgraph`)
    #[default]
    Fetch,
    /// Associations outside the graph keep their declared fetch type (`javax.persistence.loadgraph`)
    Load,
}

impl GraphSemantic {
    /// The persistence hint name this semantic corresponds to
    pub fn hint_name(self) -> &'static str {
        match self {
            GraphSemantic::Fetch => "javax.persistence.fetchgraph",
            GraphSemantic::Load => "javax.persistence.loadgraph",
        }
    }
}

impl fmt::Display for GraphSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphSemantic::Fetch => write!(f, "fetch"),
            GraphSemantic::Load => write!(f, "load"),
        }
    }
}

impl FromStr for GraphSemantic {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fetch" | "fetchgraph" | "javax.persistence.fetchgraph" => Ok(GraphSemantic::Fetch),
            "load" | "loadgraph" | "javax.persistence.loadgraph" => Ok(GraphSemantic::Load),
            _ => Err(ConfigError::InvalidValue {
                field: "graph_semantic".to_string(),
                value: s.to_string(),
                expected: "fetch or load".to_string(),
            }),
        }
    }
}

/// One association to materialize, with an optional nested plan for its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchNode {
    /// Association name
    pub name: String,
    /// Nested plan for the association's target
    pub subgraph: Option<FetchPlan>,
}

impl FetchNode {
    /// A node with no nested plan
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subgraph: None,
        }
    }

    fn merge(&mut self, other: FetchNode) {
        match (&mut self.subgraph, other.subgraph) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (None, Some(theirs)) => self.subgraph = Some(theirs),
            (_, None) => {}
        }
    }
}

/// A set of sibling fetch nodes, keyed by association name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPlan {
    nodes: BTreeMap<String, FetchNode>,
}

impl FetchPlan {
    /// Create an empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add leaf nodes: the associations themselves are materialized, nothing below them
    pub fn add_attribute_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.insert(FetchNode::leaf(name));
        }
        self
    }

    /// Add a node with a nested plan built by `build`
    pub fn add_subgraph<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FetchPlan) -> FetchPlan,
    {
        let subgraph = build(FetchPlan::new());
        self.insert(FetchNode {
            name: name.into(),
            subgraph: Some(subgraph),
        });
        self
    }

    /// Insert a node, merging with an existing node of the same name
    pub fn insert(&mut self, node: FetchNode) {
        match self.nodes.get_mut(&node.name) {
            Some(existing) => existing.merge(node),
            None => {
                self.nodes.insert(node.name.clone(), node);
            }
        }
    }

    /// Merge another plan into this one
    pub fn merge(&mut self, other: FetchPlan) {
        for (_, node) in other.nodes {
            self.insert(node);
        }
    }

    /// Add a dotted path such as `department.company`
    pub fn add_path(&mut self, path: &str) -> ModelResult<()> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(ModelError::InvalidPlan(format!(
                "Malformed association path '{}'",
                path
            )));
        }

        let node = segments.iter().rev().fold(None, |nested: Option<FetchNode>, name| {
            let subgraph = nested.map(|child| {
                let mut plan = FetchPlan::new();
                plan.insert(child);
                plan
            });
            Some(FetchNode {
                name: (*name).to_string(),
                subgraph,
            })
        });

        if let Some(node) = node {
            self.insert(node);
        }
        Ok(())
    }

    /// Look up a node by association name
    pub fn get(&self, name: &str) -> Option<&FetchNode> {
        self.nodes.get(name)
    }

    /// Iterate over nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &FetchNode> {
        self.nodes.values()
    }

    /// Check if the plan has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node path in the plan, including intermediate ones
    pub fn paths(&self) -> BTreeSet<String> {
        let mut paths = BTreeSet::new();
        self.collect_paths("", &mut paths);
        paths
    }

    /// Depth of the deepest node (0 for an empty plan)
    pub fn depth(&self) -> usize {
        self.nodes()
            .map(|node| 1 + node.subgraph.as_ref().map_or(0, FetchPlan::depth))
            .max()
            .unwrap_or(0)
    }

    fn collect_paths(&self, prefix: &str, paths: &mut BTreeSet<String>) {
        for node in self.nodes() {
            let path = if prefix.is_empty() {
                node.name.clone()
            } else {
                format!("{}.{}", prefix, node.name)
            };
            if let Some(subgraph) = &node.subgraph {
                subgraph.collect_paths(&path, paths);
            }
            paths.insert(path);
        }
    }
}

/// A fetch plan rooted at entity type `M`
#[derive(Debug)]
pub struct EntityGraph<M> {
    root: FetchPlan,
    _marker: PhantomData<fn() -> M>,
}

impl<M> Clone for EntityGraph<M> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M> PartialEq for EntityGraph<M> {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl<M: Model> Default for EntityGraph<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> EntityGraph<M> {
    /// Create an empty graph for `M`
    pub fn new() -> Self {
        Self {
            root: FetchPlan::new(),
            _marker: PhantomData,
        }
    }

    /// Build a graph from dotted association paths
    pub fn from_paths<I, S>(paths: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut graph = Self::new();
        for path in paths {
            graph.root.add_path(path.as_ref())?;
        }
        Ok(graph)
    }

    /// Add leaf nodes on the root entity
    pub fn add_attribute_nodes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.root = self.root.add_attribute_nodes(names);
        self
    }

    /// Add a subgraph on the root entity
    pub fn add_subgraph<F>(mut self, name: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(FetchPlan) -> FetchPlan,
    {
        self.root = self.root.add_subgraph(name, build);
        self
    }

    /// Entity name of the root
    pub fn root_entity(&self) -> &'static str {
        M::entity_name()
    }

    /// The plan tree
    pub fn plan(&self) -> &FetchPlan {
        &self.root
    }

    /// Every node path, including intermediate ones
    pub fn paths(&self) -> BTreeSet<String> {
        self.root.paths()
    }

    /// Check if the graph requests nothing
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_paths_agree() {
        let built = FetchPlan::new()
            .add_subgraph("department", |g| g.add_attribute_nodes(["company"]))
            .add_subgraph("related_departments", |g| g.add_attribute_nodes(["company"]));

        let mut parsed = FetchPlan::new();
        parsed.add_path("department.company").unwrap();
        parsed.add_path("related_departments.company").unwrap();

        assert_eq!(built, parsed);
        let paths: Vec<String> = built.paths().into_iter().collect();
        assert_eq!(
            paths,
            vec![
                "department",
                "department.company",
                "related_departments",
                "related_departments.company",
            ]
        );
        assert_eq!(built.depth(), 2);
    }

    #[test]
    fn test_same_attribute_merges_subgraphs() {
        let mut plan = FetchPlan::new().add_attribute_nodes(["department"]);
        plan.add_path("department.company").unwrap();

        let department = plan.get("department").unwrap();
        assert!(department.subgraph.as_ref().unwrap().get("company").is_some());
        assert_eq!(plan.nodes().count(), 1);
    }

    #[test]
    fn test_malformed_path_is_invalid_plan() {
        let mut plan = FetchPlan::new();
        assert!(plan.add_path("department..company").unwrap_err().is_invalid_plan());
        assert!(plan.add_path("").unwrap_err().is_invalid_plan());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_graph_semantic_parsing() {
        assert_eq!("fetch".parse::<GraphSemantic>().unwrap(), GraphSemantic::Fetch);
        assert_eq!(
            "javax.persistence.loadgraph".parse::<GraphSemantic>().unwrap(),
            GraphSemantic::Load
        );
        assert!("eager".parse::<GraphSemantic>().is_err());
        assert_eq!(GraphSemantic::Fetch.hint_name(), "javax.persistence.fetchgraph");
    }
}
