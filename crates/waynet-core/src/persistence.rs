//! Save/Load functionality for persisting engine state
//!
//! Uses bincode for compact binary snapshots. The waypoint network is stored
//! as its construction records plus per-node visit bookkeeping, and rebuilt
//! on load; topology synthesis is deterministic, so the rebuilt connections
//! match the saved ones. Agents are restored idle at their saved positions.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use waynet_logic::config::{AgentConfig, NavConfig};
use waynet_logic::geometry::Vec3;
use waynet_logic::graph::{NodeId, WaypointGraph};
use waynet_logic::topology::{ConfigurationError, WaypointRecord};

use crate::components::AgentStats;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the engine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulated seconds since start
    pub sim_time: f64,
    pub time_scale: f32,
    pub config: NavConfig,
    /// Records the network was built from
    pub records: Vec<WaypointRecord>,
    pub visits: Vec<NodeVisits>,
    pub agents: Vec<SavedAgent>,
}

/// Visit bookkeeping for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeVisits {
    pub id: NodeId,
    pub visited: bool,
    pub visit_count: u32,
}

/// An agent's placement and settings, without its in-flight route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAgent {
    pub name: String,
    pub position: Vec3,
    pub config: AgentConfig,
    pub stats: AgentStats,
}

/// Collect visit bookkeeping from a graph.
pub fn node_visits(graph: &WaypointGraph) -> Vec<NodeVisits> {
    graph
        .all_nodes()
        .map(|n| NodeVisits {
            id: n.id,
            visited: n.visited,
            visit_count: n.visit_count,
        })
        .collect()
}

/// Write visit bookkeeping back onto a rebuilt graph. Unknown ids are ignored.
pub fn restore_visits(graph: &mut WaypointGraph, visits: &[NodeVisits]) {
    for v in visits {
        if let Some(node) = graph.get_node_mut(v.id) {
            node.visited = v.visited;
            node.visit_count = v.visit_count;
        }
    }
}

/// Save a snapshot to a writer
pub fn save_snapshot<W: Write>(writer: W, data: &SaveData) -> Result<(), SaveError> {
    bincode::serialize_into(writer, data)?;
    Ok(())
}

/// Load a snapshot from a reader
pub fn load_snapshot<R: Read>(reader: R) -> Result<SaveData, SaveError> {
    let data: SaveData = bincode::deserialize_from(reader)?;

    if data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: data.version,
        });
    }
    Ok(data)
}

impl SaveData {
    pub fn new(
        sim_time: f64,
        time_scale: f32,
        config: NavConfig,
        records: Vec<WaypointRecord>,
        visits: Vec<NodeVisits>,
        agents: Vec<SavedAgent>,
    ) -> Self {
        Self {
            version: SAVE_VERSION,
            sim_time,
            time_scale,
            config,
            records,
            visits,
            agents,
        }
    }
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
    /// The saved records no longer form a valid network.
    Network(ConfigurationError),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<ConfigurationError> for SaveError {
    fn from(e: ConfigurationError) -> Self {
        SaveError::Network(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            SaveError::Network(e) => write!(f, "Saved network is invalid: {}", e),
        }
    }
}

impl std::error::Error for SaveError {}
