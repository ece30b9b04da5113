//! Components carried by navigating agents.

use serde::{Deserialize, Serialize};
use waynet_logic::agent::TraversalAgent;
use waynet_logic::events::NavEvent;

/// Display name of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Traversal state machine for one agent.
#[derive(Debug, Clone)]
pub struct Navigator {
    pub agent: TraversalAgent,
}

impl Navigator {
    pub fn new(agent: TraversalAgent) -> Self {
        Self { agent }
    }
}

/// Lifetime counters, folded from the agent's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub arrivals: u32,
    pub waypoints_passed: u32,
    pub deliveries: u32,
    pub skipped_stops: u32,
    pub routes_completed: u32,
}

impl AgentStats {
    pub fn record(&mut self, event: &NavEvent) {
        match event {
            NavEvent::ArrivedAtDestination { .. } => self.arrivals += 1,
            NavEvent::WaypointReached { .. } => self.waypoints_passed += 1,
            NavEvent::CompletedDelivery { .. } => self.deliveries += 1,
            NavEvent::StopSkipped { .. } => self.skipped_stops += 1,
            NavEvent::CompletedFullRoute => self.routes_completed += 1,
            _ => {}
        }
    }
}
