/// Loading modules for the graphfetch ORM
/// Provides entity graphs, path-scoped planning, join execution and hydration

pub mod entity_graph;
pub mod hydration;
pub mod optimizer;

pub use entity_graph::{EntityGraph, FetchNode, FetchPlan, GraphSemantic};
pub use hydration::{HydratedAssociation, HydratedEntity};
pub use optimizer::{
    ExecutionResult, ExecutionStats, NodeSource, PlanExecutor, PlanStatistics, QueryNode, QueryPlan,
    QueryPlanner,
};
