//! Route sequencing: which waypoints to visit, and in what order.
//!
//! Candidate selection ([`VisitMode`]) and ordering ([`TraverseMode`]) are
//! independent. The greedy ordering is a nearest-neighbour tour
//! construction. It is not an optimal tour and makes no attempt to be one.

use crate::geometry::Vec3;
use crate::graph::{NodeId, WaypointGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which nodes go into the stop queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitMode {
    #[default]
    All,
    DeliveryOnly,
    /// Caller-supplied list, used as given.
    Custom,
}

/// How the stop queue is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraverseMode {
    /// Ascending id (custom lists keep their own order).
    #[default]
    Sequential,
    Random,
    /// Greedy nearest-neighbour from the agent's position.
    #[serde(rename = "shortest-path")]
    ShortestPathHeuristic,
}

/// Node closest to `position` by straight-line distance (lowest id on ties).
pub fn nearest_node(graph: &WaypointGraph, position: Vec3) -> Option<NodeId> {
    let mut best: Option<(NodeId, f32)> = None;
    for node in graph.all_nodes() {
        let d = node.position.distance_squared(&position);
        match best {
            Some((_, b)) if d >= b => {}
            _ => best = Some((node.id, d)),
        }
    }
    best.map(|(id, _)| id)
}

/// Candidate stops for a visit mode, before ordering.
pub fn candidates(graph: &WaypointGraph, visit_mode: VisitMode, custom: &[NodeId]) -> Vec<NodeId> {
    match visit_mode {
        VisitMode::All => graph.node_ids(),
        VisitMode::DeliveryOnly => {
            let delivery: Vec<NodeId> = graph.delivery_nodes().map(|n| n.id).collect();
            if delivery.is_empty() {
                log::warn!("No delivery waypoints in network, visiting all nodes instead");
                graph.node_ids()
            } else {
                delivery
            }
        }
        VisitMode::Custom => custom.to_vec(),
    }
}

/// Build an ordered stop queue.
pub fn build_route<R: Rng + ?Sized>(
    graph: &WaypointGraph,
    visit_mode: VisitMode,
    traverse_mode: TraverseMode,
    custom: &[NodeId],
    position: Vec3,
    rng: &mut R,
) -> Vec<NodeId> {
    let mut stops = candidates(graph, visit_mode, custom);
    match traverse_mode {
        TraverseMode::Sequential => {
            if visit_mode != VisitMode::Custom {
                stops.sort_unstable();
            }
        }
        TraverseMode::Random => stops.shuffle(rng),
        TraverseMode::ShortestPathHeuristic => {
            stops = greedy_order(graph, &stops, position);
        }
    }
    stops
}

/// Greedy nearest-neighbour ordering of `stops`, starting from the stop
/// closest to `position`. Duplicates are dropped; ids missing from the graph
/// have no position and are appended at the end in their given order.
pub fn greedy_order(graph: &WaypointGraph, stops: &[NodeId], position: Vec3) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut remaining: Vec<(NodeId, Vec3)> = Vec::new();
    let mut unplaced: Vec<NodeId> = Vec::new();
    for &id in stops {
        if !seen.insert(id) {
            continue;
        }
        match graph.position(id) {
            Some(p) => remaining.push((id, p)),
            None => unplaced.push(id),
        }
    }

    let mut order = Vec::with_capacity(remaining.len() + unplaced.len());
    let mut cursor = position;
    while !remaining.is_empty() {
        let mut best = 0;
        for (i, (id, p)) in remaining.iter().enumerate() {
            let d = p.distance_squared(&cursor);
            let (best_id, best_p) = remaining[best];
            let best_d = best_p.distance_squared(&cursor);
            if d < best_d || (d == best_d && *id < best_id) {
                best = i;
            }
        }
        let (id, p) = remaining.swap_remove(best);
        order.push(id);
        cursor = p;
    }
    order.extend(unplaced);
    order
}
