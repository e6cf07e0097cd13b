//! Routing solve primitive
//!
//! The planner describes one batch as a [`SearchModel`] — nodes,
//! vehicles, cost callbacks, cumulative dimensions and declared
//! constraints — and hands it to an engine behind [`RouteSearch`].
//! The engine returns an [`Assignment`] or nothing; it never sees
//! services, trailers or cities, only the model.

mod insertion;

pub use insertion::InsertionSearch;

use std::time::Duration;

/// Arc cost callback: cost of traveling between two nodes. Must return
/// a sentinel for out-of-range indices rather than panic; a panic here
/// would abort the whole search.
pub type TransitEvaluator = Box<dyn Fn(usize, usize) -> i64 + Send + Sync>;

/// Node demand callback for a cumulative dimension. Must return 0 for
/// any node outside the model, for the same reason.
pub type DemandEvaluator = Box<dyn Fn(usize) -> i64 + Send + Sync>;

/// How a dimension accumulates along a route.
pub enum DimensionEvaluator {
    /// Adds the node's demand when the node is visited.
    Node(DemandEvaluator),
    /// Adds the arc's value when the arc is traversed.
    Arc(TransitEvaluator),
}

/// A bounded cumulative resource attached to every vehicle.
pub struct DimensionSpec {
    pub name: &'static str,
    pub evaluator: DimensionEvaluator,
    /// Per-vehicle upper bound on the cumulative value at route end.
    pub capacities: Vec<i64>,
    /// Cost per unit of each vehicle's span on this dimension; 0 for a
    /// pure constraint dimension.
    pub span_cost_coefficient: i64,
}

/// A group of nodes that may be jointly left out of the solution at a
/// fixed penalty instead of being visited.
pub struct Disjunction {
    pub nodes: Vec<usize>,
    pub penalty: i64,
}

/// If `vehicle` serves `node`, the node visited right after it must be
/// `next`.
pub struct ForcedNext {
    pub node: usize,
    pub vehicle: usize,
    pub next: usize,
}

/// A fully specified routing model for one batch.
pub struct SearchModel {
    pub node_count: usize,
    pub vehicle_count: usize,
    /// Per-vehicle start node. Vehicles may share a node.
    pub starts: Vec<usize>,
    /// Per-vehicle end node.
    pub ends: Vec<usize>,
    pub transit: TransitEvaluator,
    pub dimensions: Vec<DimensionSpec>,
    /// (pickup node, delivery node): both on the same vehicle, pickup
    /// visited no later than the delivery.
    pub pairs: Vec<(usize, usize)>,
    pub disjunctions: Vec<Disjunction>,
    pub forced_next: Vec<ForcedNext>,
}

/// First-solution construction heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstSolutionStrategy {
    /// Insert pairs in declaration order, each at its cheapest feasible
    /// position.
    PathCheapestArc,
    /// Repeatedly insert the globally cheapest remaining pair.
    ParallelCheapestInsertion,
}

/// Local-search family applied after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metaheuristic {
    None,
    GreedyDescent,
    GuidedLocalSearch,
}

/// Search controls shared by every engine.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Wall-clock budget; on expiry the engine returns its best so far.
    pub time_budget: Duration,
    pub first_solution: FirstSolutionStrategy,
    pub metaheuristic: Metaheuristic,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(60),
            first_solution: FirstSolutionStrategy::PathCheapestArc,
            metaheuristic: Metaheuristic::GuidedLocalSearch,
        }
    }
}

/// A feasible assignment of nodes to vehicle routes.
///
/// Next-node queries are per vehicle because vehicles based in the same
/// city share depot nodes; a global next map would be ambiguous there.
#[derive(Debug, Clone)]
pub struct Assignment {
    routes: Vec<Vec<usize>>,
    dropped: Vec<usize>,
    pub objective: i64,
}

impl Assignment {
    pub fn new(routes: Vec<Vec<usize>>, mut dropped: Vec<usize>, objective: i64) -> Self {
        dropped.sort_unstable();
        Self { routes, dropped, objective }
    }

    pub fn vehicle_count(&self) -> usize {
        self.routes.len()
    }

    /// Full walk of one vehicle, start and end depot included.
    pub fn route(&self, vehicle: usize) -> &[usize] {
        &self.routes[vehicle]
    }

    /// Node visited right after `node` on this vehicle's route, `None`
    /// when the node is not on the route or is its final node.
    pub fn next_node(&self, vehicle: usize, node: usize) -> Option<usize> {
        let route = self.routes.get(vehicle)?;
        let pos = route.iter().position(|&n| n == node)?;
        route.get(pos + 1).copied()
    }

    /// Nodes excluded from the solution via disjunctions, ascending.
    pub fn dropped(&self) -> &[usize] {
        &self.dropped
    }
}

/// The delegated routing engine.
pub trait RouteSearch: Send + Sync {
    /// Search for an assignment within the time budget. `None` means no
    /// solution was found; it is an expected outcome, not an error.
    fn solve(&self, model: &SearchModel, params: &SearchParams) -> Option<Assignment>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_next_node_walks_the_route() {
        // One vehicle based at node 0: 0 -> 2 -> 3 -> 0
        let assignment = Assignment::new(vec![vec![0, 2, 3, 0]], vec![], 42);

        assert_eq!(assignment.next_node(0, 0), Some(2));
        assert_eq!(assignment.next_node(0, 2), Some(3));
        assert_eq!(assignment.next_node(0, 3), Some(0));
        assert_eq!(assignment.next_node(0, 7), None);
        assert_eq!(assignment.next_node(1, 0), None);
    }

    #[test]
    fn test_assignment_dropped_is_sorted() {
        let assignment = Assignment::new(vec![vec![0, 0]], vec![5, 2, 9], 0);
        assert_eq!(assignment.dropped(), &[2, 5, 9]);
    }

    #[test]
    fn test_default_params_use_sixty_second_budget() {
        let params = SearchParams::default();
        assert_eq!(params.time_budget, Duration::from_secs(60));
        assert_eq!(params.first_solution, FirstSolutionStrategy::PathCheapestArc);
        assert_eq!(params.metaheuristic, Metaheuristic::GuidedLocalSearch);
    }
}
