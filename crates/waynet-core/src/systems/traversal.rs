//! Traversal system - advances every agent's state machine over the shared graph

use hecs::{Entity, World};
use waynet_logic::events::NavEvent;
use waynet_logic::graph::WaypointGraph;

use crate::components::Navigator;

/// Tick every navigator by `delta_seconds`.
///
/// Agents run in ascending entity id order so that the shared visit flags,
/// and therefore `AllNodesVisited`, resolve the same way on every run.
pub fn traversal_system(
    world: &mut World,
    graph: &mut WaypointGraph,
    delta_seconds: f32,
) -> Vec<(Entity, NavEvent)> {
    let mut order: Vec<Entity> = world
        .query::<&Navigator>()
        .iter()
        .map(|(entity, _)| entity)
        .collect();
    order.sort_by_key(|e| e.id());

    let mut events = Vec::new();
    for entity in order {
        if let Ok(mut nav) = world.get::<&mut Navigator>(entity) {
            for event in nav.agent.tick(graph, delta_seconds) {
                log::debug!("[agent {}] {:?}", entity.id(), event);
                events.push((entity, event));
            }
        }
    }
    events
}
