//! Cheapest-insertion search engine
//!
//! Construction inserts pickup-delivery pairs at their cheapest
//! feasible positions, honoring every declared dimension bound, pair
//! precedence and forced-next implication; optional pairs are dropped
//! when no feasible insertion beats their penalty. A relocate descent
//! then improves the solution until the time budget runs out; the
//! guided variant penalizes expensive arcs of the incumbent to escape
//! shallow local optima.
//!
//! Construction itself is not deadline-checked: it is polynomial and
//! fast at batch sizes, and aborting it early could only ever turn a
//! feasible round into a spurious no-solution.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::warn;

use super::{
    Assignment, DimensionEvaluator, DimensionSpec, FirstSolutionStrategy, Metaheuristic,
    RouteSearch, SearchModel, SearchParams,
};

/// Deterministic cheapest-feasible-insertion engine.
///
/// Supported model shape: every non-depot node belongs to exactly one
/// pair, disjunctions cover exactly the two nodes of one pair, and each
/// forced-next points at the owning vehicle's end depot. Models outside
/// this shape are rejected as unsolvable with a logged warning.
pub struct InsertionSearch;

impl InsertionSearch {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InsertionSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteSearch for InsertionSearch {
    fn solve(&self, model: &SearchModel, params: &SearchParams) -> Option<Assignment> {
        let mut engine = Engine::prepare(model, params)?;
        if !engine.construct(params.first_solution) {
            return None;
        }
        engine.improve(params.metaheuristic);
        Some(engine.into_assignment())
    }
}

#[derive(Debug, Clone)]
struct PairInfo {
    pickup: usize,
    delivery: usize,
    /// Index into `model.disjunctions` when the pair is optional.
    disjunction: Option<usize>,
}

#[derive(Debug, Clone)]
struct Insertion {
    vehicle: usize,
    visits: Vec<usize>,
    delta: i64,
}

struct Engine<'a> {
    model: &'a SearchModel,
    deadline: Instant,
    /// Visited nodes per vehicle, depots excluded.
    routes: Vec<Vec<usize>>,
    pairs: Vec<PairInfo>,
    /// node -> (partner node, node is the pickup side)
    partner: HashMap<usize, (usize, bool)>,
    /// (vehicle, node) present means the node must close that
    /// vehicle's route.
    forced_last: HashSet<(usize, usize)>,
    dropped_disjunctions: HashSet<usize>,
    /// Guided-search arc penalties; empty outside the guided variant.
    arc_penalties: HashMap<(usize, usize), i64>,
    penalty_lambda: i64,
}

impl<'a> Engine<'a> {
    /// Validate the model and build the working state. Returns `None`
    /// (with a warning) for models outside the supported shape.
    fn prepare(model: &'a SearchModel, params: &SearchParams) -> Option<Self> {
        let v = model.vehicle_count;
        if model.starts.len() != v || model.ends.len() != v {
            warn!("model rejected: start/end lists do not match vehicle count");
            return None;
        }
        if model
            .starts
            .iter()
            .chain(model.ends.iter())
            .any(|&n| n >= model.node_count)
        {
            warn!("model rejected: depot node out of range");
            return None;
        }
        for dim in &model.dimensions {
            if dim.capacities.len() != v {
                warn!("model rejected: dimension '{}' capacity list mismatch", dim.name);
                return None;
            }
        }

        let mut partner = HashMap::new();
        for &(pickup, delivery) in &model.pairs {
            if pickup >= model.node_count || delivery >= model.node_count || pickup == delivery {
                warn!("model rejected: invalid pair ({}, {})", pickup, delivery);
                return None;
            }
            if partner.insert(pickup, (delivery, true)).is_some()
                || partner.insert(delivery, (pickup, false)).is_some()
            {
                warn!("model rejected: node reused across pairs");
                return None;
            }
        }

        let depot_nodes: HashSet<usize> =
            model.starts.iter().chain(model.ends.iter()).copied().collect();
        for node in 0..model.node_count {
            if !depot_nodes.contains(&node) && !partner.contains_key(&node) {
                warn!("model rejected: node {} is neither depot nor paired", node);
                return None;
            }
        }

        let mut pairs: Vec<PairInfo> = model
            .pairs
            .iter()
            .map(|&(pickup, delivery)| PairInfo { pickup, delivery, disjunction: None })
            .collect();
        for (dj_idx, dj) in model.disjunctions.iter().enumerate() {
            let covered = pairs.iter_mut().find(|pair| {
                let set: HashSet<usize> = dj.nodes.iter().copied().collect();
                set.len() == 2 && set.contains(&pair.pickup) && set.contains(&pair.delivery)
            });
            match covered {
                Some(pair) if pair.disjunction.is_none() => pair.disjunction = Some(dj_idx),
                _ => {
                    warn!("model rejected: disjunction {} does not cover exactly one pair", dj_idx);
                    return None;
                }
            }
        }

        let mut forced_last = HashSet::new();
        for forced in &model.forced_next {
            if forced.vehicle >= v || forced.node >= model.node_count {
                warn!("model rejected: forced-next out of range");
                return None;
            }
            if forced.next != model.ends[forced.vehicle] {
                warn!("model rejected: forced-next must point at the vehicle's end depot");
                return None;
            }
            forced_last.insert((forced.vehicle, forced.node));
        }

        Some(Self {
            model,
            deadline: Instant::now() + params.time_budget,
            routes: vec![Vec::new(); v],
            pairs,
            partner,
            forced_last,
            dropped_disjunctions: HashSet::new(),
            arc_penalties: HashMap::new(),
            penalty_lambda: 0,
        })
    }

    fn dim_usage(&self, vehicle: usize, dim: &DimensionSpec, visits: &[usize]) -> i64 {
        match &dim.evaluator {
            DimensionEvaluator::Node(demand) => {
                let mut total = demand(self.model.starts[vehicle]);
                for &node in visits {
                    total += demand(node);
                }
                total + demand(self.model.ends[vehicle])
            }
            DimensionEvaluator::Arc(arc) => {
                let mut total = 0;
                let mut prev = self.model.starts[vehicle];
                for &node in visits {
                    total += arc(prev, node);
                    prev = node;
                }
                total + arc(prev, self.model.ends[vehicle])
            }
        }
    }

    fn route_feasible(&self, vehicle: usize, visits: &[usize]) -> bool {
        let mut position: HashMap<usize, usize> = HashMap::with_capacity(visits.len());
        for (idx, &node) in visits.iter().enumerate() {
            if self.forced_last.contains(&(vehicle, node)) && idx + 1 != visits.len() {
                return false;
            }
            position.insert(node, idx);
        }

        for &node in visits {
            if let Some(&(partner, is_pickup)) = self.partner.get(&node) {
                match position.get(&partner) {
                    Some(&partner_idx) => {
                        let own_idx = position[&node];
                        if is_pickup && partner_idx < own_idx {
                            return false;
                        }
                        if !is_pickup && partner_idx > own_idx {
                            return false;
                        }
                    }
                    // half a pair on a route is never valid
                    None => return false,
                }
            }
        }

        for dim in &self.model.dimensions {
            if self.dim_usage(vehicle, dim, visits) > dim.capacities[vehicle] {
                return false;
            }
        }
        true
    }

    fn route_cost(&self, vehicle: usize, visits: &[usize], augmented: bool) -> i64 {
        let mut cost = 0;
        let mut prev = self.model.starts[vehicle];
        for &node in visits.iter().chain(std::iter::once(&self.model.ends[vehicle])) {
            cost += (self.model.transit)(prev, node);
            if augmented && self.penalty_lambda > 0 {
                if let Some(&p) = self.arc_penalties.get(&(prev, node)) {
                    cost += self.penalty_lambda * p;
                }
            }
            prev = node;
        }
        for dim in &self.model.dimensions {
            if dim.span_cost_coefficient > 0 {
                cost += dim.span_cost_coefficient * self.dim_usage(vehicle, dim, visits);
            }
        }
        cost
    }

    /// Cheapest feasible insertion of a pair over all vehicles and
    /// position combinations. Deterministic: scans vehicles and
    /// positions in order and keeps the first strict minimum.
    fn best_insertion(&self, pair: &PairInfo, augmented: bool) -> Option<Insertion> {
        let mut best: Option<Insertion> = None;
        for vehicle in 0..self.model.vehicle_count {
            let visits = &self.routes[vehicle];
            let base = self.route_cost(vehicle, visits, augmented);
            for pickup_pos in 0..=visits.len() {
                let mut with_pickup = visits.clone();
                with_pickup.insert(pickup_pos, pair.pickup);
                for delivery_pos in (pickup_pos + 1)..=with_pickup.len() {
                    let mut candidate = with_pickup.clone();
                    candidate.insert(delivery_pos, pair.delivery);
                    if !self.route_feasible(vehicle, &candidate) {
                        continue;
                    }
                    let delta = self.route_cost(vehicle, &candidate, augmented) - base;
                    if best.as_ref().map_or(true, |b| delta < b.delta) {
                        best = Some(Insertion { vehicle, visits: candidate, delta });
                    }
                }
            }
        }
        best
    }

    fn apply(&mut self, insertion: Insertion) {
        self.routes[insertion.vehicle] = insertion.visits;
    }

    /// Build the first solution. `false` means some mandatory pair has
    /// no feasible placement, i.e. the model has no solution this
    /// engine can find.
    fn construct(&mut self, strategy: FirstSolutionStrategy) -> bool {
        let mandatory: Vec<usize> = (0..self.pairs.len())
            .filter(|&i| self.pairs[i].disjunction.is_none())
            .collect();

        match strategy {
            FirstSolutionStrategy::PathCheapestArc => {
                for idx in mandatory {
                    let pair = self.pairs[idx].clone();
                    match self.best_insertion(&pair, false) {
                        Some(insertion) => self.apply(insertion),
                        None => return false,
                    }
                }
            }
            FirstSolutionStrategy::ParallelCheapestInsertion => {
                let mut remaining: Vec<usize> = mandatory;
                while !remaining.is_empty() {
                    let mut cheapest: Option<(usize, Insertion)> = None;
                    for &idx in &remaining {
                        let pair = self.pairs[idx].clone();
                        match self.best_insertion(&pair, false) {
                            Some(insertion) => {
                                let better = cheapest
                                    .as_ref()
                                    .map_or(true, |(_, b)| insertion.delta < b.delta);
                                if better {
                                    cheapest = Some((idx, insertion));
                                }
                            }
                            // insertions only consume capacity, so a pair
                            // infeasible now stays infeasible
                            None => return false,
                        }
                    }
                    let (chosen, insertion) = match cheapest {
                        Some(found) => found,
                        None => return false,
                    };
                    self.apply(insertion);
                    remaining.retain(|&i| i != chosen);
                }
            }
        }

        // Optional pairs: serve them only when cheaper than the penalty.
        for idx in 0..self.pairs.len() {
            let pair = self.pairs[idx].clone();
            let Some(dj_idx) = pair.disjunction else { continue };
            let penalty = self.model.disjunctions[dj_idx].penalty;
            match self.best_insertion(&pair, false) {
                Some(insertion) if insertion.delta <= penalty => self.apply(insertion),
                _ => {
                    self.dropped_disjunctions.insert(dj_idx);
                }
            }
        }
        true
    }

    fn true_objective(&self) -> i64 {
        let mut objective = 0;
        for vehicle in 0..self.model.vehicle_count {
            objective += self.route_cost(vehicle, &self.routes[vehicle], false);
        }
        for &dj_idx in &self.dropped_disjunctions {
            objective += self.model.disjunctions[dj_idx].penalty;
        }
        objective
    }

    fn vehicle_of(&self, pair: &PairInfo) -> Option<usize> {
        self.routes
            .iter()
            .position(|route| route.contains(&pair.pickup))
    }

    /// One relocate sweep over every pair: move it to a better
    /// placement, drop it (optional pairs), or revive it from the
    /// dropped set. Returns whether anything improved.
    fn relocate_pass(&mut self, augmented: bool) -> bool {
        let mut improved = false;
        for idx in 0..self.pairs.len() {
            if Instant::now() >= self.deadline {
                break;
            }
            let pair = self.pairs[idx].clone();

            if let Some(dj_idx) = pair.disjunction {
                if self.dropped_disjunctions.contains(&dj_idx) {
                    let penalty = self.model.disjunctions[dj_idx].penalty;
                    if let Some(insertion) = self.best_insertion(&pair, augmented) {
                        if insertion.delta < penalty {
                            self.apply(insertion);
                            self.dropped_disjunctions.remove(&dj_idx);
                            improved = true;
                        }
                    }
                    continue;
                }
            }

            let Some(vehicle) = self.vehicle_of(&pair) else { continue };
            let saved = self.routes[vehicle].clone();
            let base = self.route_cost(vehicle, &saved, augmented);
            self.routes[vehicle].retain(|&n| n != pair.pickup && n != pair.delivery);
            let removal_gain = base - self.route_cost(vehicle, &self.routes[vehicle], augmented);

            let reinsert = self.best_insertion(&pair, augmented);
            let reinsert_delta = reinsert.as_ref().map(|i| i.delta - removal_gain);

            let mut applied = false;
            if let Some(dj_idx) = pair.disjunction {
                let drop_delta = self.model.disjunctions[dj_idx].penalty - removal_gain;
                let beats_reinsert = reinsert_delta.map_or(true, |ins| drop_delta < ins);
                if drop_delta < 0 && beats_reinsert {
                    self.dropped_disjunctions.insert(dj_idx);
                    applied = true;
                    improved = true;
                }
            }
            if !applied {
                if let Some(insertion) = reinsert {
                    if insertion.delta < removal_gain {
                        self.apply(insertion);
                        applied = true;
                        improved = true;
                    }
                }
            }
            if !applied {
                self.routes[vehicle] = saved;
            }
        }
        improved
    }

    /// Penalize the arc of the incumbent with the highest
    /// cost-to-penalty ratio. Returns `false` when no arc is worth
    /// penalizing.
    fn penalize_worst_arc(&mut self) -> bool {
        let mut worst: Option<((usize, usize), f64)> = None;
        for vehicle in 0..self.model.vehicle_count {
            let mut prev = self.model.starts[vehicle];
            for &node in self.routes[vehicle]
                .iter()
                .chain(std::iter::once(&self.model.ends[vehicle]))
            {
                let cost = (self.model.transit)(prev, node);
                if cost > 0 {
                    let penalty = self.arc_penalties.get(&(prev, node)).copied().unwrap_or(0);
                    let utility = cost as f64 / (1.0 + penalty as f64);
                    if worst.as_ref().map_or(true, |(_, u)| utility > *u) {
                        worst = Some(((prev, node), utility));
                    }
                }
                prev = node;
            }
        }
        match worst {
            Some((arc, _)) => {
                *self.arc_penalties.entry(arc).or_insert(0) += 1;
                true
            }
            None => false,
        }
    }

    fn improve(&mut self, metaheuristic: Metaheuristic) {
        if metaheuristic == Metaheuristic::None {
            return;
        }
        let guided = metaheuristic == Metaheuristic::GuidedLocalSearch;
        if guided {
            let arcs: usize = self
                .routes
                .iter()
                .map(|r| r.len() + 1)
                .sum::<usize>()
                .max(1);
            self.penalty_lambda = (self.true_objective() * 3 / 10 / arcs as i64).max(1);
        }

        let mut best_routes = self.routes.clone();
        let mut best_dropped = self.dropped_disjunctions.clone();
        let mut best_objective = self.true_objective();

        while Instant::now() < self.deadline {
            let improved = self.relocate_pass(guided);
            let objective = self.true_objective();
            if objective < best_objective {
                best_objective = objective;
                best_routes = self.routes.clone();
                best_dropped = self.dropped_disjunctions.clone();
            }
            if !improved {
                if !guided || !self.penalize_worst_arc() {
                    break;
                }
            }
        }

        self.routes = best_routes;
        self.dropped_disjunctions = best_dropped;
    }

    fn into_assignment(self) -> Assignment {
        let objective = self.true_objective();
        let mut full_routes = Vec::with_capacity(self.model.vehicle_count);
        for vehicle in 0..self.model.vehicle_count {
            let mut walk = Vec::with_capacity(self.routes[vehicle].len() + 2);
            walk.push(self.model.starts[vehicle]);
            walk.extend(self.routes[vehicle].iter().copied());
            walk.push(self.model.ends[vehicle]);
            full_routes.push(walk);
        }
        let dropped = self
            .dropped_disjunctions
            .iter()
            .flat_map(|&dj_idx| self.model.disjunctions[dj_idx].nodes.iter().copied())
            .collect();
        Assignment::new(full_routes, dropped, objective)
    }
}
