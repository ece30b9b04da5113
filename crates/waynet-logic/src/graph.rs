//! Waypoint graph: an id-indexed table of nodes and their connection sets.
//!
//! Nodes live in a `BTreeMap` keyed by [`NodeId`] so that iteration order is
//! always ascending by id. Topology construction, sequencing and validation
//! all depend on that for deterministic output.
//!
//! Connections are directed sets. [`WaypointGraph::connect`] adds both
//! directions; [`WaypointGraph::connect_one_way`] is what the topology
//! builder uses before return-path enforcement.

use crate::geometry::{Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable waypoint identifier, unique within one graph.
pub type NodeId = u32;

/// Per-search A* bookkeeping. Only meaningful during one planner call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchScratch {
    pub g_cost: f32,
    pub h_cost: f32,
    pub f_cost: f32,
    pub parent_id: Option<NodeId>,
}

/// A single addressable location in the navigation graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointNode {
    pub id: NodeId,
    pub position: Vec3,
    pub connections: BTreeSet<NodeId>,
    pub is_delivery_point: bool,
    pub visited: bool,
    pub visit_count: u32,
    #[serde(skip)]
    pub scratch: SearchScratch,
}

impl WaypointNode {
    pub fn new(id: NodeId, position: Vec3, is_delivery_point: bool) -> Self {
        Self {
            id,
            position,
            connections: BTreeSet::new(),
            is_delivery_point,
            visited: false,
            visit_count: 0,
            scratch: SearchScratch::default(),
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Structural graph errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id is already registered.
    DuplicateId(NodeId),
    /// No node with this id exists.
    UnknownNode(NodeId),
    /// A node may not connect to itself.
    SelfConnection(NodeId),
    /// Every id is taken; no automatic id can be assigned.
    IdSpaceExhausted,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicateId(id) => write!(f, "waypoint #{} is already registered", id),
            GraphError::UnknownNode(id) => write!(f, "waypoint #{} does not exist", id),
            GraphError::SelfConnection(id) => {
                write!(f, "waypoint #{} cannot connect to itself", id)
            }
            GraphError::IdSpaceExhausted => write!(f, "no free waypoint id left"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// What a validation issue is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Node has an empty connection set.
    IsolatedNode(NodeId),
    /// Edge exists in one direction only.
    OneWayEdge { from: NodeId, to: NodeId },
    /// Two nodes share (nearly) the same position.
    CoincidentNodes(NodeId, NodeId),
    /// Connection set references a node that is not in the graph.
    DanglingConnection { from: NodeId, to: NodeId },
    /// Graph has no nodes at all.
    EmptyGraph,
}

/// A graph validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
}

impl Issue {
    fn warning(kind: IssueKind, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message,
        }
    }

    fn error(kind: IssueKind, message: String) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message,
        }
    }
}

/// Result of marking a node visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitOutcome {
    /// Visit counter after this visit.
    pub visit_count: u32,
    /// True if the node was not visited before this call.
    pub first_visit: bool,
    /// True if this visit completed the set of visited nodes.
    pub completed_all: bool,
}

/// Id-indexed waypoint table with a rebuild generation counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointGraph {
    nodes: BTreeMap<NodeId, WaypointNode>,
    next_id: NodeId,
    generation: u64,
}

impl WaypointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. With `id = None` the next discovery-order id is used,
    /// falling back to the lowest free id once the top of the range is taken.
    ///
    /// Registering an id that already exists is an error; the existing node
    /// is left untouched.
    pub fn register_node(
        &mut self,
        id: Option<NodeId>,
        position: Vec3,
        is_delivery_point: bool,
    ) -> Result<NodeId, GraphError> {
        let id = match id {
            Some(id) => id,
            None => self.free_id().ok_or(GraphError::IdSpaceExhausted)?,
        };
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateId(id));
        }
        self.nodes
            .insert(id, WaypointNode::new(id, position, is_delivery_point));
        self.next_id = self.next_id.max(id.saturating_add(1));
        Ok(id)
    }

    fn free_id(&self) -> Option<NodeId> {
        let mut candidate = self.next_id;
        while self.nodes.contains_key(&candidate) {
            candidate = match candidate.checked_add(1) {
                Some(next) => next,
                None => return (0..self.next_id).find(|id| !self.nodes.contains_key(id)),
            };
        }
        Some(candidate)
    }

    /// Connect two nodes in both directions.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<(), GraphError> {
        self.connect_one_way(a, b)?;
        self.connect_one_way(b, a)
    }

    /// Add `to` to the connection set of `from` only.
    pub fn connect_one_way(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfConnection(from));
        }
        if !self.nodes.contains_key(&to) {
            return Err(GraphError::UnknownNode(to));
        }
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or(GraphError::UnknownNode(from))?;
        node.connections.insert(to);
        Ok(())
    }

    /// Add the reverse of every one-way edge. Returns how many were added.
    pub fn enforce_bidirectional(&mut self) -> usize {
        let missing: Vec<(NodeId, NodeId)> = self
            .nodes
            .values()
            .flat_map(|n| n.connections.iter().map(move |&to| (n.id, to)))
            .filter(|(from, to)| {
                self.nodes
                    .get(to)
                    .is_some_and(|t| !t.connections.contains(from))
            })
            .collect();
        for &(from, to) in &missing {
            if let Some(node) = self.nodes.get_mut(&to) {
                node.connections.insert(from);
            }
        }
        missing.len()
    }

    /// Drop every connection and bump the generation.
    pub fn clear_connections(&mut self) {
        for node in self.nodes.values_mut() {
            node.connections.clear();
        }
        self.bump_generation();
    }

    /// Remove every node and bump the generation.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.next_id = 0;
        self.bump_generation();
    }

    /// Invalidate paths computed against the previous topology.
    pub fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get_node(&self, id: NodeId) -> Option<&WaypointNode> {
        self.nodes.get(&id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut WaypointNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<Vec3> {
        self.nodes.get(&id).map(|n| n.position)
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(|n| n.connections.iter().copied())
    }

    /// All nodes in ascending id order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &WaypointNode> {
        self.nodes.values()
    }

    pub(crate) fn all_nodes_mut(&mut self) -> impl Iterator<Item = &mut WaypointNode> {
        self.nodes.values_mut()
    }

    /// Delivery nodes in ascending id order.
    pub fn delivery_nodes(&self) -> impl Iterator<Item = &WaypointNode> {
        self.nodes.values().filter(|n| n.is_delivery_point)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of directed edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.connections.len()).sum()
    }

    /// Mark a node visited and bump its counter. Visiting twice is fine.
    pub fn mark_visited(&mut self, id: NodeId) -> Result<VisitOutcome, GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))?;
        let first_visit = !node.visited;
        node.visited = true;
        node.visit_count = node.visit_count.saturating_add(1);
        let visit_count = node.visit_count;
        let completed_all = first_visit && self.all_visited();
        Ok(VisitOutcome {
            visit_count,
            first_visit,
            completed_all,
        })
    }

    pub fn all_visited(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.values().all(|n| n.visited)
    }

    /// Clear visited flags. Visit counters are kept as lifetime statistics.
    pub fn reset_visited(&mut self) {
        for node in self.nodes.values_mut() {
            node.visited = false;
        }
    }

    /// Report isolated nodes, one-way edges, dangling references and
    /// coincident positions. None of these are fatal.
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        if self.nodes.is_empty() {
            issues.push(Issue::error(
                IssueKind::EmptyGraph,
                "Waypoint network has no nodes".to_string(),
            ));
            return issues;
        }

        for node in self.nodes.values() {
            if node.is_isolated() {
                issues.push(Issue::warning(
                    IssueKind::IsolatedNode(node.id),
                    format!("Waypoint #{} has no connections", node.id),
                ));
            }
            for &to in &node.connections {
                match self.nodes.get(&to) {
                    None => issues.push(Issue::error(
                        IssueKind::DanglingConnection { from: node.id, to },
                        format!("Waypoint #{} connects to missing #{}", node.id, to),
                    )),
                    Some(other) if !other.connections.contains(&node.id) => {
                        issues.push(Issue::warning(
                            IssueKind::OneWayEdge { from: node.id, to },
                            format!("Edge #{} -> #{} has no return path", node.id, to),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }

        let nodes: Vec<&WaypointNode> = self.nodes.values().collect();
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if a.position.distance(&b.position) < EPSILON {
                    issues.push(Issue::warning(
                        IssueKind::CoincidentNodes(a.id, b.id),
                        format!("Waypoints #{} and #{} share a position", a.id, b.id),
                    ));
                }
            }
        }

        issues
    }
}
