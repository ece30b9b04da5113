//! Semantic navigation events.
//!
//! Agents return these from `tick`; callers forward them to whatever plays
//! sounds, drives animation or updates UI. Nothing here knows about those.

use crate::graph::NodeId;
use crate::planner::PathError;
use serde::{Deserialize, Serialize};

/// Why a stop was dropped from the current route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The stop is not reachable from the agent's current node.
    NoPath,
    /// The stop id does not exist in the graph.
    UnknownNode,
    /// The agent's own position could not be resolved to a node.
    NoOrigin,
}

impl From<PathError> for SkipReason {
    fn from(e: PathError) -> Self {
        match e {
            PathError::NoPath { .. } => SkipReason::NoPath,
            PathError::UnknownNode(_) => SkipReason::UnknownNode,
        }
    }
}

/// Something observable happened in the navigation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NavEvent {
    /// A network was built with this many nodes.
    NetworkConfigured { node_count: usize },
    /// An intermediate node on the way to a stop was passed.
    WaypointReached { node: NodeId },
    /// A stop was reached.
    ArrivedAtDestination { node: NodeId },
    /// A stop was marked visited (fires on every arrival).
    NodeVisited { node: NodeId, visit_count: u32 },
    /// Every node in the graph is now visited.
    AllNodesVisited,
    StartedDelivery { node: NodeId },
    CompletedDelivery { node: NodeId },
    /// A stop was skipped without halting the route.
    StopSkipped { node: NodeId, reason: SkipReason },
    /// The stop queue was exhausted.
    CompletedFullRoute,
    /// A new stop queue was built and traversal began.
    RouteStarted { stops: usize },
}

impl NavEvent {
    /// Node the event refers to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match *self {
            NavEvent::WaypointReached { node }
            | NavEvent::ArrivedAtDestination { node }
            | NavEvent::NodeVisited { node, .. }
            | NavEvent::StartedDelivery { node }
            | NavEvent::CompletedDelivery { node }
            | NavEvent::StopSkipped { node, .. } => Some(node),
            NavEvent::NetworkConfigured { .. }
            | NavEvent::AllNodesVisited
            | NavEvent::CompletedFullRoute
            | NavEvent::RouteStarted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_from_path_error() {
        assert_eq!(
            SkipReason::from(PathError::NoPath { start: 0, target: 1 }),
            SkipReason::NoPath
        );
        assert_eq!(SkipReason::from(PathError::UnknownNode(4)), SkipReason::UnknownNode);
    }

    #[test]
    fn test_event_node() {
        assert_eq!(NavEvent::StartedDelivery { node: 3 }.node(), Some(3));
        assert_eq!(NavEvent::CompletedFullRoute.node(), None);
    }
}
