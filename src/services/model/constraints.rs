//! Constraint families applied to a batch model
//!
//! Which families apply, and in which order, is data: the builder runs
//! an ordered rule list so a round can be assembled with a subset of
//! families when tuning. Order matters twice over: disjunctions claim
//! their nodes before later families may touch them, and the engine
//! sees dimensions in declaration order.

use std::collections::HashSet;

use tracing::warn;

use crate::services::solver::{
    DimensionEvaluator, DimensionSpec, Disjunction, ForcedNext, SearchModel,
};
use crate::types::{CapacityKind, ConstraintWeights, Service, Trailer};

use super::demand::node_demands;
use super::indexer::{NodeIndexer, NodeRole};
use super::DistanceTable;

/// Upper bound for the distance dimension when no per-trailer cap is
/// configured. Large enough to never bind, small enough to keep the
/// span cost in i64 range.
const DISTANCE_DIM_CEILING: i64 = 10_000_000;

/// One family of constraints. Applied in list order by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintRule {
    /// One accumulating dimension per capacity kind any trailer has.
    CapacityDimensions,
    /// Route length dimension, span-costed per km, optionally capped.
    DistanceWithSpan,
    /// Same-city services become droppable at a penalty.
    LowPriorityDisjunctions,
    /// Deliveries under a base rule must close their route.
    ForcedReturn,
    /// Every service row is a pickup-then-delivery pair.
    PickupDeliveryPairs,
}

/// The production rule order.
pub fn default_rules() -> Vec<ConstraintRule> {
    vec![
        ConstraintRule::CapacityDimensions,
        ConstraintRule::DistanceWithSpan,
        ConstraintRule::LowPriorityDisjunctions,
        ConstraintRule::ForcedReturn,
        ConstraintRule::PickupDeliveryPairs,
    ]
}

/// Nodes already claimed by a disjunction. A node may belong to at most
/// one disjunction, so each family claims before it adds.
#[derive(Debug, Default)]
pub struct UsedNodeSet {
    claimed: HashSet<usize>,
}

impl UsedNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims all of `nodes`, or none of them when any is taken.
    pub fn try_claim(&mut self, nodes: &[usize]) -> bool {
        if nodes.iter().any(|node| self.claimed.contains(node)) {
            return false;
        }
        self.claimed.extend(nodes.iter().copied());
        true
    }
}

pub(super) struct RuleContext<'a> {
    pub services: &'a [Service],
    pub trailers: &'a [Trailer],
    pub weights: &'a ConstraintWeights,
    pub indexer: &'a NodeIndexer,
    pub distances: &'a DistanceTable,
}

pub(super) fn apply_rule(
    rule: ConstraintRule,
    model: &mut SearchModel,
    ctx: &RuleContext<'_>,
    used: &mut UsedNodeSet,
) {
    match rule {
        ConstraintRule::CapacityDimensions => capacity_dimensions(model, ctx),
        ConstraintRule::DistanceWithSpan => distance_with_span(model, ctx),
        ConstraintRule::LowPriorityDisjunctions => low_priority_disjunctions(model, ctx, used),
        ConstraintRule::ForcedReturn => forced_return(model, ctx),
        ConstraintRule::PickupDeliveryPairs => pickup_delivery_pairs(model, ctx),
    }
}

fn capacity_dimensions(model: &mut SearchModel, ctx: &RuleContext<'_>) {
    for kind in CapacityKind::ALL {
        let capacities: Vec<i64> = ctx
            .trailers
            .iter()
            .map(|trailer| trailer.capacity.get(kind))
            .collect();
        // a kind no trailer carries would only forbid its services
        if capacities.iter().all(|&cap| cap <= 0) {
            continue;
        }
        let demands = node_demands(ctx.indexer, ctx.services, kind);
        model.dimensions.push(DimensionSpec {
            name: kind.as_str(),
            evaluator: DimensionEvaluator::Node(Box::new(move |node| {
                demands.get(node).copied().unwrap_or(0)
            })),
            capacities,
            span_cost_coefficient: 0,
        });
    }
}

fn distance_with_span(model: &mut SearchModel, ctx: &RuleContext<'_>) {
    let capacities = match ctx.weights.distance_cap() {
        Some(cap) => vec![cap; ctx.trailers.len()],
        None => vec![DISTANCE_DIM_CEILING; ctx.trailers.len()],
    };
    let table = ctx.distances.clone();
    model.dimensions.push(DimensionSpec {
        name: "distance",
        evaluator: DimensionEvaluator::Arc(Box::new(move |from, to| table.km(from, to))),
        capacities,
        span_cost_coefficient: ctx.weights.dist_penalty_per_km,
    });
}

fn low_priority_disjunctions(
    model: &mut SearchModel,
    ctx: &RuleContext<'_>,
    used: &mut UsedNodeSet,
) {
    for (row, service) in ctx.services.iter().enumerate() {
        if !service.is_low_priority() {
            continue;
        }
        let nodes = vec![
            ctx.indexer.node_for(row, NodeRole::Pickup),
            ctx.indexer.node_for(row, NodeRole::Delivery),
        ];
        if !used.try_claim(&nodes) {
            warn!(
                service_key = %service.service_key,
                "Skipping low-priority disjunction: nodes already claimed"
            );
            continue;
        }
        model.disjunctions.push(Disjunction {
            nodes,
            penalty: ctx.weights.low_priority_penalty,
        });
    }
}

fn forced_return(model: &mut SearchModel, ctx: &RuleContext<'_>) {
    for (row, service) in ctx.services.iter().enumerate() {
        if !service.force_return {
            continue;
        }
        let delivery = ctx.indexer.node_for(row, NodeRole::Delivery);
        for (vehicle, &end) in model.ends.iter().enumerate() {
            model.forced_next.push(ForcedNext { node: delivery, vehicle, next: end });
        }
    }
}

fn pickup_delivery_pairs(model: &mut SearchModel, ctx: &RuleContext<'_>) {
    for row in 0..ctx.services.len() {
        model.pairs.push((
            ctx.indexer.node_for(row, NodeRole::Pickup),
            ctx.indexer.node_for(row, NodeRole::Delivery),
        ));
    }
}
