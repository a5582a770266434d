/// Query planning and execution for selective eager loading
///
/// Plans are trees of association paths; the executor walks them as joins
/// over the storage backend and assembles hydrated entity trees.
pub mod executor;
pub mod plan;

pub use executor::{ExecutionResult, ExecutionStats, PlanExecutor};
pub use plan::{NodeSource, PlanStatistics, QueryNode, QueryPlan, QueryPlanner};
