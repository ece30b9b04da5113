//! A* pathfinding over the waypoint graph.
//!
//! `calculate_path` is the bare search: it resets every node's
//! [`SearchScratch`](crate::graph::SearchScratch), then expands the open set
//! by lowest `f = g + h` (ties: lower `h`, then lower id). The heuristic is
//! straight-line distance to the target, which never overestimates the
//! length of an edge path.
//!
//! `PathPlanner` wraps it with a small bounded cache that is dropped
//! whenever the graph generation changes.

use crate::graph::{NodeId, SearchScratch, WaypointGraph};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

/// Node sequence from start to target, stamped with the graph generation it
/// was computed against.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub generation: u64,
}

impl Path {
    /// True if the graph has been rebuilt since this path was computed.
    pub fn is_stale(&self, graph: &WaypointGraph) -> bool {
        self.generation != graph.generation()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of edges traversed.
    pub fn hop_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Pathfinding failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    /// Start or target is not in the graph.
    UnknownNode(NodeId),
    /// Target is not reachable from start.
    NoPath { start: NodeId, target: NodeId },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::UnknownNode(id) => write!(f, "waypoint #{} does not exist", id),
            PathError::NoPath { start, target } => {
                write!(f, "no path from waypoint #{} to #{}", start, target)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Open-set entry, ordered so `BinaryHeap` pops the lowest `f` first.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f32,
    h: f32,
    id: NodeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Shortest path from `start` to `target` by A*.
///
/// `start == target` yields a single-node path.
pub fn calculate_path(
    graph: &mut WaypointGraph,
    start: NodeId,
    target: NodeId,
) -> Result<Path, PathError> {
    let target_pos = graph.position(target).ok_or(PathError::UnknownNode(target))?;
    let start_pos = graph.position(start).ok_or(PathError::UnknownNode(start))?;

    for node in graph.all_nodes_mut() {
        node.scratch = SearchScratch {
            g_cost: f32::INFINITY,
            h_cost: 0.0,
            f_cost: f32::INFINITY,
            parent_id: None,
        };
    }

    let h0 = start_pos.distance(&target_pos);
    if let Some(node) = graph.get_node_mut(start) {
        node.scratch = SearchScratch {
            g_cost: 0.0,
            h_cost: h0,
            f_cost: h0,
            parent_id: None,
        };
    }

    let mut open = BinaryHeap::new();
    let mut closed: HashSet<NodeId> = HashSet::new();
    open.push(OpenEntry {
        f: h0,
        h: h0,
        id: start,
    });

    while let Some(OpenEntry { id: current, .. }) = open.pop() {
        if !closed.insert(current) {
            continue;
        }
        if current == target {
            return Ok(Path {
                nodes: reconstruct(graph, start, target),
                generation: graph.generation(),
            });
        }

        let Some(node) = graph.get_node(current) else {
            continue;
        };
        let current_pos = node.position;
        let current_g = node.scratch.g_cost;
        let neighbors: Vec<NodeId> = node.connections.iter().copied().collect();

        for next in neighbors {
            if closed.contains(&next) {
                continue;
            }
            let Some(next_node) = graph.get_node_mut(next) else {
                continue;
            };
            let tentative = current_g + current_pos.distance(&next_node.position);
            if tentative < next_node.scratch.g_cost {
                let h = next_node.position.distance(&target_pos);
                next_node.scratch = SearchScratch {
                    g_cost: tentative,
                    h_cost: h,
                    f_cost: tentative + h,
                    parent_id: Some(current),
                };
                open.push(OpenEntry {
                    f: tentative + h,
                    h,
                    id: next,
                });
            }
        }
    }

    Err(PathError::NoPath { start, target })
}

fn reconstruct(graph: &WaypointGraph, start: NodeId, target: NodeId) -> Vec<NodeId> {
    let mut nodes = vec![target];
    let mut current = target;
    // Parent chains are acyclic; the bound only guards against corrupt scratch
    let mut remaining = graph.node_count();
    while current != start && remaining > 0 {
        match graph.get_node(current).and_then(|n| n.scratch.parent_id) {
            Some(parent) => {
                nodes.push(parent);
                current = parent;
            }
            None => break,
        }
        remaining -= 1;
    }
    nodes.reverse();
    nodes
}

/// Summed edge length of a node sequence. Unknown ids contribute nothing.
pub fn path_length(graph: &WaypointGraph, nodes: &[NodeId]) -> f32 {
    nodes
        .windows(2)
        .filter_map(|w| Some(graph.position(w[0])?.distance(&graph.position(w[1])?)))
        .sum()
}

/// A* with a bounded per-generation path cache.
#[derive(Debug, Clone)]
pub struct PathPlanner {
    /// (from, to) → cached node sequence. Simple bounded cache.
    cache: HashMap<(NodeId, NodeId), Vec<NodeId>>,
    cache_capacity: usize,
    cache_generation: u64,
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PathPlanner {
    pub fn new() -> Self {
        Self::with_cache(64)
    }

    /// Planner with a specific cache capacity. Zero disables caching.
    pub fn with_cache(cache_capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            cache_capacity,
            cache_generation: 0,
        }
    }

    pub fn calculate_path(
        &mut self,
        graph: &mut WaypointGraph,
        start: NodeId,
        target: NodeId,
    ) -> Result<Path, PathError> {
        if self.cache_generation != graph.generation() {
            self.cache.clear();
            self.cache_generation = graph.generation();
        }

        let key = (start, target);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(Path {
                nodes: cached.clone(),
                generation: graph.generation(),
            });
        }

        let path = calculate_path(graph, start, target)?;

        if self.cache_capacity > 0 {
            if self.cache.len() >= self.cache_capacity {
                // Evict an arbitrary entry
                if let Some(&evict_key) = self.cache.keys().next() {
                    self.cache.remove(&evict_key);
                }
            }
            self.cache.insert(key, path.nodes.clone());
        }

        Ok(path)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}
