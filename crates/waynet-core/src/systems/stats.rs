//! Stats system - folds navigation events into per-agent counters

use hecs::{Entity, World};
use waynet_logic::events::NavEvent;

use crate::components::AgentStats;

/// Apply a batch of events to the owning agents' `AgentStats`.
pub fn stats_system(world: &mut World, events: &[(Entity, NavEvent)]) {
    for (entity, event) in events {
        if let Ok(mut stats) = world.get::<&mut AgentStats>(*entity) {
            stats.record(event);
        }
    }
}
