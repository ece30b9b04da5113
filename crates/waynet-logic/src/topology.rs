//! Topology synthesis: turns waypoint positions into connection sets.
//!
//! Each mode produces a list of *forward* edges. Return paths are added
//! afterwards when `create_return_paths` is set, so a network built with it
//! disabled is a directed graph.
//!
//! | Mode | Edges |
//! |------|-------|
//! | `Linear` | consecutive nodes along the dominant ground axis |
//! | `Loop` | linear chain plus last → first |
//! | `Hub` | every node → the node with the smallest total distance to the rest |
//! | `Grid` | 4-neighbours within clustered rows and columns |
//! | `NearestNeighbor` | each node → its k nearest within range |
//! | `Manual` | explicit record connections only |
//! | `Auto` | one of `Linear`, `Grid`, `NearestNeighbor` via [`classify_layout`] |
//!
//! All passes iterate nodes in ascending id order and break distance ties by
//! id, so the same input always produces the same connections.

use crate::geometry::{Axis, Extents, Vec3, EPSILON};
use crate::graph::{GraphError, NodeId, WaypointGraph};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How connections are synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyMode {
    #[default]
    Auto,
    Linear,
    Loop,
    Hub,
    Grid,
    NearestNeighbor,
    Manual,
}

/// Tunable thresholds for layout classification and grid clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDetectConfig {
    /// Minor/major extent ratio below which a layout is linear.
    pub linear_extent_ratio: f32,
    /// Max coordinate gap (m) between nodes in the same row or column.
    pub alignment_tolerance: f32,
    /// Fraction of nodes that must sit in aligned rows and columns for a grid.
    pub grid_coverage: f32,
    /// X/Z extent ratio at or above which the extents count as comparable
    /// and linear ordering falls back to the Z axis.
    pub comparable_extent_ratio: f32,
}

impl Default for AutoDetectConfig {
    fn default() -> Self {
        Self {
            linear_extent_ratio: 0.3,
            alignment_tolerance: 1.0,
            grid_coverage: 0.7,
            comparable_extent_ratio: 0.9,
        }
    }
}

/// Network construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    pub mode: TopologyMode,
    /// Upper bound on edge length for `Grid` and `NearestNeighbor` (m).
    pub max_connection_distance: f32,
    pub create_return_paths: bool,
    pub nearest_neighbor_count: usize,
    pub auto_detect: AutoDetectConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            mode: TopologyMode::Auto,
            max_connection_distance: 15.0,
            create_return_paths: true,
            nearest_neighbor_count: 3,
            auto_detect: AutoDetectConfig::default(),
        }
    }
}

/// One waypoint as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    #[serde(default)]
    pub id: Option<NodeId>,
    pub position: Vec3,
    /// Outgoing connections that are added regardless of mode.
    #[serde(default)]
    pub connections: Vec<NodeId>,
    #[serde(default)]
    pub is_delivery_point: bool,
}

impl WaypointRecord {
    pub fn at(position: Vec3) -> Self {
        Self {
            id: None,
            position,
            connections: Vec::new(),
            is_delivery_point: false,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn delivery(mut self) -> Self {
        self.is_delivery_point = true;
        self
    }

    pub fn connected_to(mut self, ids: &[NodeId]) -> Self {
        self.connections.extend_from_slice(ids);
        self
    }
}

/// Records for a flat position list; ids follow list order.
pub fn records_from_positions(positions: &[Vec3]) -> Vec<WaypointRecord> {
    positions.iter().map(|&p| WaypointRecord::at(p)).collect()
}

/// Network construction failure. The graph is left empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No waypoints were supplied.
    EmptyNodeSet,
    /// Two records claim the same id.
    DuplicateId(NodeId),
    /// An id-less record could not be given a free id.
    IdSpaceExhausted,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::EmptyNodeSet => write!(f, "no waypoints to configure"),
            ConfigurationError::DuplicateId(id) => {
                write!(f, "waypoint id {} appears more than once", id)
            }
            ConfigurationError::IdSpaceExhausted => write!(f, "no free waypoint id left"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Summary of a topology pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyReport {
    /// Mode actually applied (`Auto` is resolved to a concrete mode).
    pub mode: TopologyMode,
    pub node_count: usize,
    /// Directed edge count after return-path enforcement.
    pub edge_count: usize,
    pub return_paths_added: usize,
}

/// Build a fresh graph from records.
pub fn build_network(
    records: &[WaypointRecord],
    config: &TopologyConfig,
) -> Result<(WaypointGraph, TopologyReport), ConfigurationError> {
    let mut graph = WaypointGraph::new();
    let report = configure_network(&mut graph, records, config)?;
    Ok((graph, report))
}

/// Replace the contents of `graph` with `records` and synthesize topology.
///
/// On error the graph is left empty, with its generation bumped so agents
/// drop any path computed against the old contents.
pub fn configure_network(
    graph: &mut WaypointGraph,
    records: &[WaypointRecord],
    config: &TopologyConfig,
) -> Result<TopologyReport, ConfigurationError> {
    graph.clear();

    if records.is_empty() {
        log::warn!("Waypoint network configuration skipped: no waypoints");
        return Err(ConfigurationError::EmptyNodeSet);
    }

    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        match graph.register_node(record.id, record.position, record.is_delivery_point) {
            Ok(id) => ids.push(id),
            Err(GraphError::DuplicateId(id)) => {
                graph.clear();
                log::warn!("Waypoint network configuration failed: duplicate id {}", id);
                return Err(ConfigurationError::DuplicateId(id));
            }
            Err(GraphError::IdSpaceExhausted) => {
                graph.clear();
                log::warn!("Waypoint network configuration failed: no free waypoint id");
                return Err(ConfigurationError::IdSpaceExhausted);
            }
            Err(e) => {
                // register_node only fails on id allocation
                log::warn!("Unexpected registration failure: {}", e);
            }
        }
    }

    apply_explicit_connections(graph, records, &ids);
    let report = synthesize(graph, config);

    log::info!(
        "Waypoint network configured: {} nodes, {} edges ({:?})",
        report.node_count,
        report.edge_count,
        report.mode
    );
    Ok(report)
}

/// Recompute the mode-specific connections of an existing graph.
///
/// Explicit record connections are not kept; use [`configure_network`] with
/// the original records to rebuild those as well.
pub fn rebuild_topology(graph: &mut WaypointGraph, config: &TopologyConfig) -> TopologyReport {
    graph.clear_connections();
    synthesize(graph, config)
}

fn apply_explicit_connections(graph: &mut WaypointGraph, records: &[WaypointRecord], ids: &[NodeId]) {
    for (record, &from) in records.iter().zip(ids) {
        for &to in &record.connections {
            if let Err(e) = graph.connect_one_way(from, to) {
                log::warn!("Skipping explicit connection #{} -> #{}: {}", from, to, e);
            }
        }
    }
}

fn synthesize(graph: &mut WaypointGraph, config: &TopologyConfig) -> TopologyReport {
    let nodes: Vec<(NodeId, Vec3)> = graph.all_nodes().map(|n| (n.id, n.position)).collect();

    let mode = match config.mode {
        TopologyMode::Auto => classify_layout(&nodes, &config.auto_detect),
        other => other,
    };

    let edges = match mode {
        TopologyMode::Linear => linear_edges(&nodes, &config.auto_detect),
        TopologyMode::Loop => loop_edges(&nodes, &config.auto_detect),
        TopologyMode::Hub => hub_edges(&nodes),
        TopologyMode::Grid => grid_edges(&nodes, config),
        TopologyMode::NearestNeighbor => nearest_neighbor_edges(
            &nodes,
            config.nearest_neighbor_count,
            config.max_connection_distance,
        ),
        TopologyMode::Manual | TopologyMode::Auto => Vec::new(),
    };

    for (from, to) in edges {
        if let Err(e) = graph.connect_one_way(from, to) {
            log::debug!("Dropped synthesized edge #{} -> #{}: {}", from, to, e);
        }
    }

    let return_paths_added = if config.create_return_paths {
        graph.enforce_bidirectional()
    } else {
        0
    };

    graph.bump_generation();

    let report = TopologyReport {
        mode,
        node_count: graph.node_count(),
        edge_count: graph.edge_count(),
        return_paths_added,
    };

    for issue in graph.validate() {
        log::warn!("{}", issue.message);
    }

    report
}

// ── Classification ──────────────────────────────────────────────────────

/// Pick a concrete mode for `Auto`.
///
/// 1. Minor extent below `linear_extent_ratio` of the major extent → `Linear`
/// 2. ≥2 aligned rows and ≥2 aligned columns covering `grid_coverage` of the
///    nodes → `Grid`
/// 3. Otherwise → `NearestNeighbor`
pub fn classify_layout(nodes: &[(NodeId, Vec3)], auto: &AutoDetectConfig) -> TopologyMode {
    if nodes.len() <= 2 {
        return TopologyMode::Linear;
    }
    let Some(ext) = Extents::of(nodes.iter().map(|(_, p)| p)) else {
        return TopologyMode::Linear;
    };
    let (major, minor) = ext.major_minor();
    if major < EPSILON || minor < auto.linear_extent_ratio * major {
        return TopologyMode::Linear;
    }

    let rows = cluster_along(nodes, Axis::Z, auto.alignment_tolerance);
    let cols = cluster_along(nodes, Axis::X, auto.alignment_tolerance);
    let aligned_rows = aligned_clusters(&rows);
    let aligned_cols = aligned_clusters(&cols);

    if aligned_rows.len() >= 2 && aligned_cols.len() >= 2 {
        let covered = nodes
            .iter()
            .filter(|(id, _)| {
                rows.get(id).is_some_and(|r| aligned_rows.contains(r))
                    && cols.get(id).is_some_and(|c| aligned_cols.contains(c))
            })
            .count();
        if covered as f32 >= auto.grid_coverage * nodes.len() as f32 {
            return TopologyMode::Grid;
        }
    }

    TopologyMode::NearestNeighbor
}

/// Assign each node a cluster index along `axis`. A new cluster starts when
/// the gap to the previous coordinate exceeds `tolerance`.
fn cluster_along(nodes: &[(NodeId, Vec3)], axis: Axis, tolerance: f32) -> BTreeMap<NodeId, usize> {
    let mut sorted: Vec<(NodeId, f32)> = nodes.iter().map(|(id, p)| (*id, p.along(axis))).collect();
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut clusters = BTreeMap::new();
    let mut cluster = 0usize;
    let mut prev: Option<f32> = None;
    for (id, v) in sorted {
        if let Some(p) = prev {
            if v - p > tolerance {
                cluster += 1;
            }
        }
        clusters.insert(id, cluster);
        prev = Some(v);
    }
    clusters
}

/// Cluster indices with at least two members.
fn aligned_clusters(clusters: &BTreeMap<NodeId, usize>) -> Vec<usize> {
    let mut sizes: BTreeMap<usize, usize> = BTreeMap::new();
    for &c in clusters.values() {
        *sizes.entry(c).or_default() += 1;
    }
    sizes
        .into_iter()
        .filter(|&(_, n)| n >= 2)
        .map(|(c, _)| c)
        .collect()
}

// ── Mode passes ─────────────────────────────────────────────────────────

/// Axis nodes are sorted along for linear layouts: X when it clearly
/// dominates, Z otherwise (including comparable extents).
pub fn dominant_axis(nodes: &[(NodeId, Vec3)], auto: &AutoDetectConfig) -> Axis {
    let Some(ext) = Extents::of(nodes.iter().map(|(_, p)| p)) else {
        return Axis::X;
    };
    let (w, d) = (ext.width(), ext.depth());
    if w > d && d < auto.comparable_extent_ratio * w {
        Axis::X
    } else {
        Axis::Z
    }
}

fn linear_order(nodes: &[(NodeId, Vec3)], auto: &AutoDetectConfig) -> Vec<NodeId> {
    let axis = dominant_axis(nodes, auto);
    let mut sorted = nodes.to_vec();
    sorted.sort_by(|(ia, a), (ib, b)| {
        a.along(axis)
            .total_cmp(&b.along(axis))
            .then(a.along(axis.other()).total_cmp(&b.along(axis.other())))
            .then(ia.cmp(ib))
    });
    sorted.into_iter().map(|(id, _)| id).collect()
}

fn chain(order: &[NodeId]) -> Vec<(NodeId, NodeId)> {
    order.windows(2).map(|w| (w[0], w[1])).collect()
}

fn linear_edges(nodes: &[(NodeId, Vec3)], auto: &AutoDetectConfig) -> Vec<(NodeId, NodeId)> {
    chain(&linear_order(nodes, auto))
}

/// The linear chain with its ends joined.
fn loop_edges(nodes: &[(NodeId, Vec3)], auto: &AutoDetectConfig) -> Vec<(NodeId, NodeId)> {
    let order = linear_order(nodes, auto);
    let mut edges = chain(&order);
    if order.len() >= 3 {
        edges.push((order[order.len() - 1], order[0]));
    }
    edges
}

/// Node with the smallest summed distance to all others (lowest id on ties).
pub fn hub_node(nodes: &[(NodeId, Vec3)]) -> Option<NodeId> {
    let mut best: Option<(NodeId, f32)> = None;
    for (id, p) in nodes {
        let total: f32 = nodes.iter().map(|(_, q)| p.distance(q)).sum();
        match best {
            Some((_, b)) if total >= b => {}
            _ => best = Some((*id, total)),
        }
    }
    best.map(|(id, _)| id)
}

fn hub_edges(nodes: &[(NodeId, Vec3)]) -> Vec<(NodeId, NodeId)> {
    let Some(hub) = hub_node(nodes) else {
        return Vec::new();
    };
    nodes
        .iter()
        .filter(|(id, _)| *id != hub)
        .map(|(id, _)| (*id, hub))
        .collect()
}

fn grid_edges(nodes: &[(NodeId, Vec3)], config: &TopologyConfig) -> Vec<(NodeId, NodeId)> {
    let tol = config.auto_detect.alignment_tolerance;
    let rows = cluster_along(nodes, Axis::Z, tol);
    let cols = cluster_along(nodes, Axis::X, tol);
    let positions: BTreeMap<NodeId, Vec3> = nodes.iter().copied().collect();

    let mut edges = Vec::new();
    // Left/right neighbours within each row, then above/below within each column
    for (clusters, axis) in [(&rows, Axis::X), (&cols, Axis::Z)] {
        let mut groups: BTreeMap<usize, Vec<(NodeId, Vec3)>> = BTreeMap::new();
        for (&id, &c) in clusters {
            if let Some(&p) = positions.get(&id) {
                groups.entry(c).or_default().push((id, p));
            }
        }
        for members in groups.values_mut() {
            members.sort_by(|(ia, a), (ib, b)| {
                a.along(axis).total_cmp(&b.along(axis)).then(ia.cmp(ib))
            });
            for w in members.windows(2) {
                let ((a, pa), (b, pb)) = (w[0], w[1]);
                if pa.distance(&pb) <= config.max_connection_distance {
                    edges.push((a, b));
                }
            }
        }
    }
    edges
}

fn nearest_neighbor_edges(
    nodes: &[(NodeId, Vec3)],
    k: usize,
    max_distance: f32,
) -> Vec<(NodeId, NodeId)> {
    let mut edges = Vec::new();
    for (id, p) in nodes {
        let mut candidates: Vec<(NodeId, f32)> = nodes
            .iter()
            .filter(|(other, _)| other != id)
            .map(|(other, q)| (*other, p.distance(q)))
            .filter(|&(_, d)| d <= max_distance)
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        edges.extend(candidates.into_iter().take(k).map(|(other, _)| (*id, other)));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: TopologyMode) -> TopologyConfig {
        TopologyConfig {
            mode,
            ..Default::default()
        }
    }

    fn square() -> Vec<WaypointRecord> {
        records_from_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ])
    }

    fn grid_3x3(spacing: f32) -> Vec<WaypointRecord> {
        let mut positions = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                positions.push(Vec3::new(col as f32 * spacing, 0.0, row as f32 * spacing));
            }
        }
        records_from_positions(&positions)
    }

    fn connections(graph: &WaypointGraph, id: NodeId) -> Vec<NodeId> {
        graph.get_node(id).unwrap().connections.iter().copied().collect()
    }

    fn assert_symmetric(graph: &WaypointGraph) {
        for node in graph.all_nodes() {
            for &other in &node.connections {
                assert!(
                    graph.get_node(other).unwrap().connections.contains(&node.id),
                    "edge {} -> {} has no reverse",
                    node.id,
                    other
                );
            }
        }
    }

    #[test]
    fn test_empty_input_is_configuration_error() {
        let mut graph = WaypointGraph::new();
        let result = configure_network(&mut graph, &[], &TopologyConfig::default());
        assert_eq!(result, Err(ConfigurationError::EmptyNodeSet));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_record_ids_leave_graph_empty() {
        let records = vec![
            WaypointRecord::at(Vec3::ZERO).with_id(3),
            WaypointRecord::at(Vec3::new(5.0, 0.0, 0.0)).with_id(3),
        ];
        let mut graph = WaypointGraph::new();
        let result = configure_network(&mut graph, &records, &TopologyConfig::default());
        assert_eq!(result, Err(ConfigurationError::DuplicateId(3)));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_linear_sorts_along_x() {
        let records = records_from_positions(&[
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(10.0, 0.0, 0.0),
        ]);
        let (graph, report) = build_network(&records, &config(TopologyMode::Linear)).unwrap();
        assert_eq!(report.mode, TopologyMode::Linear);
        assert_eq!(connections(&graph, 1), vec![2]);
        assert_eq!(connections(&graph, 2), vec![0, 1]);
        assert_eq!(connections(&graph, 0), vec![2]);
    }

    #[test]
    fn test_linear_falls_back_to_z_for_comparable_extents() {
        let nodes = vec![
            (0, Vec3::new(0.0, 0.0, 0.0)),
            (1, Vec3::new(10.0, 0.0, 9.5)),
        ];
        assert_eq!(dominant_axis(&nodes, &AutoDetectConfig::default()), Axis::Z);
        let nodes = vec![
            (0, Vec3::new(0.0, 0.0, 0.0)),
            (1, Vec3::new(10.0, 0.0, 2.0)),
        ];
        assert_eq!(dominant_axis(&nodes, &AutoDetectConfig::default()), Axis::X);
    }

    #[test]
    fn test_loop_square_is_single_four_cycle() {
        let (graph, _) = build_network(&square(), &config(TopologyMode::Loop)).unwrap();
        for node in graph.all_nodes() {
            assert_eq!(node.connections.len(), 2, "node {}", node.id);
        }
        // Linear order along Z is 0, 1, 3, 2; closing joins 2 back to 0
        assert_eq!(connections(&graph, 0), vec![1, 2]);
        assert_eq!(connections(&graph, 1), vec![0, 3]);
        assert_eq!(connections(&graph, 2), vec![0, 3]);
        assert_eq!(connections(&graph, 3), vec![1, 2]);

        // Walking the cycle from 0 returns to 0 after exactly 4 steps
        let mut prev = 0;
        let mut current = connections(&graph, 0)[0];
        let mut steps = 1;
        while current != 0 {
            let next = connections(&graph, current)
                .into_iter()
                .find(|&n| n != prev)
                .unwrap();
            prev = current;
            current = next;
            steps += 1;
        }
        assert_eq!(steps, 4);
    }

    #[test]
    fn test_loop_extends_linear_chain() {
        let auto = AutoDetectConfig::default();
        for records in [square(), grid_3x3(10.0)] {
            let nodes: Vec<(NodeId, Vec3)> = records
                .iter()
                .enumerate()
                .map(|(i, r)| (r.id.unwrap_or(i as NodeId), r.position))
                .collect();
            let linear = linear_edges(&nodes, &auto);
            let looped = loop_edges(&nodes, &auto);
            assert_eq!(looped.len(), linear.len() + 1);
            assert_eq!(&looped[..linear.len()], &linear[..]);
            let first = linear[0].0;
            let last = linear[linear.len() - 1].1;
            assert_eq!(looped[linear.len()], (last, first));
        }
    }

    #[test]
    fn test_hub_connects_everything_to_center() {
        let records = records_from_positions(&[
            Vec3::new(-10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, -10.0),
        ]);
        let (graph, _) = build_network(&records, &config(TopologyMode::Hub)).unwrap();
        assert_eq!(connections(&graph, 2), vec![0, 1, 3, 4]);
        for id in [0, 1, 3, 4] {
            assert_eq!(connections(&graph, id), vec![2]);
        }
    }

    #[test]
    fn test_grid_connects_four_neighbours() {
        let (graph, _) = build_network(&grid_3x3(10.0), &config(TopologyMode::Grid)).unwrap();
        // Centre node (id 4) has 4 neighbours, corners 2, edges 3
        assert_eq!(connections(&graph, 4), vec![1, 3, 5, 7]);
        assert_eq!(connections(&graph, 0), vec![1, 3]);
        assert_eq!(connections(&graph, 1).len(), 3);
        assert_eq!(graph.edge_count(), 24);
    }

    #[test]
    fn test_grid_respects_max_distance() {
        let cfg = TopologyConfig {
            mode: TopologyMode::Grid,
            max_connection_distance: 5.0,
            ..Default::default()
        };
        let (graph, _) = build_network(&grid_3x3(10.0), &cfg).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_nearest_neighbor_limits_count_and_range() {
        let records = records_from_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
        ]);
        let cfg = TopologyConfig {
            mode: TopologyMode::NearestNeighbor,
            max_connection_distance: 10.0,
            create_return_paths: false,
            ..Default::default()
        };
        let (graph, _) = build_network(&records, &cfg).unwrap();
        assert_eq!(connections(&graph, 0), vec![1, 2, 3]);
        // Ties at distance 2 (nodes 0 and 4) go to the lower id
        assert_eq!(connections(&graph, 2), vec![0, 1, 3]);
        assert!(connections(&graph, 5).is_empty());
    }

    #[test]
    fn test_return_paths_make_graph_symmetric() {
        for mode in [
            TopologyMode::Linear,
            TopologyMode::Loop,
            TopologyMode::Hub,
            TopologyMode::Grid,
            TopologyMode::NearestNeighbor,
            TopologyMode::Auto,
        ] {
            let (graph, _) = build_network(&grid_3x3(7.0), &config(mode)).unwrap();
            assert_symmetric(&graph);
        }
    }

    #[test]
    fn test_without_return_paths_linear_is_one_way() {
        let cfg = TopologyConfig {
            mode: TopologyMode::Linear,
            create_return_paths: false,
            ..Default::default()
        };
        let records = records_from_positions(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0)]);
        let (graph, report) = build_network(&records, &cfg).unwrap();
        assert_eq!(connections(&graph, 0), vec![1]);
        assert!(connections(&graph, 1).is_empty());
        assert_eq!(report.return_paths_added, 0);
    }

    #[test]
    fn test_build_is_deterministic() {
        let positions: Vec<Vec3> = (0..40)
            .map(|i| {
                let f = i as f32;
                Vec3::new((f * 7.3) % 31.0, 0.0, (f * 3.1) % 17.0)
            })
            .collect();
        let records = records_from_positions(&positions);
        for mode in [TopologyMode::Auto, TopologyMode::NearestNeighbor, TopologyMode::Grid] {
            let (a, _) = build_network(&records, &config(mode)).unwrap();
            let (b, _) = build_network(&records, &config(mode)).unwrap();
            for node in a.all_nodes() {
                assert_eq!(node.connections, b.get_node(node.id).unwrap().connections);
            }
        }
    }

    #[test]
    fn test_classify_linear_grid_scatter() {
        let auto = AutoDetectConfig::default();
        let corridor: Vec<(NodeId, Vec3)> = (0..5)
            .map(|i| (i, Vec3::new(i as f32 * 10.0, 0.0, (i % 2) as f32)))
            .collect();
        assert_eq!(classify_layout(&corridor, &auto), TopologyMode::Linear);

        let grid: Vec<(NodeId, Vec3)> = grid_3x3(10.0)
            .into_iter()
            .enumerate()
            .map(|(i, r)| (i as NodeId, r.position))
            .collect();
        assert_eq!(classify_layout(&grid, &auto), TopologyMode::Grid);

        let scatter = vec![
            (0, Vec3::new(0.0, 0.0, 0.0)),
            (1, Vec3::new(13.0, 0.0, 4.0)),
            (2, Vec3::new(5.0, 0.0, 17.0)),
            (3, Vec3::new(21.0, 0.0, 11.0)),
            (4, Vec3::new(8.0, 0.0, 8.5)),
        ];
        assert_eq!(classify_layout(&scatter, &auto), TopologyMode::NearestNeighbor);
    }

    fn grid_with_outliers(outliers: &[Vec3]) -> Vec<(NodeId, Vec3)> {
        grid_3x3(10.0)
            .into_iter()
            .map(|r| r.position)
            .chain(outliers.iter().copied())
            .enumerate()
            .map(|(i, p)| (i as NodeId, p))
            .collect()
    }

    #[test]
    fn test_classify_grid_coverage_threshold() {
        let auto = AutoDetectConfig::default();
        // Off the 0/10/20 lines and apart from each other on both axes
        let mut outliers = vec![
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(15.0, 0.0, 13.0),
            Vec3::new(3.0, 0.0, 17.0),
        ];

        // 9 of 12 aligned = 75%
        let nodes = grid_with_outliers(&outliers);
        assert_eq!(classify_layout(&nodes, &auto), TopologyMode::Grid);

        // 9 of 13 aligned ≈ 69%
        outliers.push(Vec3::new(7.0, 0.0, 7.0));
        let nodes = grid_with_outliers(&outliers);
        assert_eq!(classify_layout(&nodes, &auto), TopologyMode::NearestNeighbor);

        let relaxed = AutoDetectConfig {
            grid_coverage: 0.6,
            ..auto
        };
        assert_eq!(classify_layout(&nodes, &relaxed), TopologyMode::Grid);
    }

    #[test]
    fn test_id_less_record_after_max_id() {
        let records = vec![
            WaypointRecord::at(Vec3::ZERO).with_id(NodeId::MAX),
            WaypointRecord::at(Vec3::new(10.0, 0.0, 0.0)),
        ];
        let mut graph = WaypointGraph::new();
        let report = configure_network(&mut graph, &records, &TopologyConfig::default()).unwrap();
        assert_eq!(report.node_count, 2);
        assert_eq!(graph.node_ids(), vec![0, NodeId::MAX]);
    }

    #[test]
    fn test_auto_resolves_mode_in_report() {
        let (_, report) = build_network(&grid_3x3(10.0), &config(TopologyMode::Auto)).unwrap();
        assert_eq!(report.mode, TopologyMode::Grid);
    }

    #[test]
    fn test_explicit_connections_and_manual_mode() {
        let records = vec![
            WaypointRecord::at(Vec3::new(0.0, 0.0, 0.0)).connected_to(&[2, 99]),
            WaypointRecord::at(Vec3::new(5.0, 0.0, 0.0)),
            WaypointRecord::at(Vec3::new(10.0, 0.0, 0.0)).delivery(),
        ];
        let (graph, report) = build_network(&records, &config(TopologyMode::Manual)).unwrap();
        assert_eq!(report.mode, TopologyMode::Manual);
        assert_eq!(connections(&graph, 0), vec![2]);
        assert_eq!(connections(&graph, 2), vec![0]);
        assert!(connections(&graph, 1).is_empty());
        assert!(graph.get_node(2).unwrap().is_delivery_point);
    }

    #[test]
    fn test_rebuild_bumps_generation() {
        let (mut graph, _) = build_network(&square(), &config(TopologyMode::Loop)).unwrap();
        let before = graph.generation();
        let report = rebuild_topology(&mut graph, &config(TopologyMode::Hub));
        assert!(graph.generation() > before);
        assert_eq!(report.mode, TopologyMode::Hub);
        assert_eq!(report.node_count, 4);
    }

    #[test]
    fn test_coincident_positions_do_not_self_connect() {
        let records = records_from_positions(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
        ]);
        for mode in [TopologyMode::NearestNeighbor, TopologyMode::Linear, TopologyMode::Hub] {
            let (graph, _) = build_network(&records, &config(mode)).unwrap();
            for node in graph.all_nodes() {
                assert!(!node.connections.contains(&node.id));
            }
        }
    }
}
