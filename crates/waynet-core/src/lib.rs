//! Waynet Core - Multi-Agent Delivery Route Engine
//!
//! An ECS-based engine in which any number of agents traverse one shared
//! waypoint network, each following its own stop queue.
//!
//! # Architecture
//!
//! The engine uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: Agents
//! - **Components**: `Name`, `Navigator` (the traversal state machine), `AgentStats`
//! - **Systems**: `traversal_system` ticks navigators, `stats_system` folds events
//!
//! The network itself is not an entity; it lives beside the world as a
//! `WaypointGraph` and is passed to the systems explicitly.
//!
//! # Example
//!
//! ```rust,no_run
//! use waynet_core::prelude::*;
//! use waynet_logic::geometry::Vec3;
//! use waynet_logic::topology::records_from_positions;
//!
//! let mut engine = NavigationEngine::default();
//! engine
//!     .configure_network(records_from_positions(&[
//!         Vec3::new(0.0, 0.0, 0.0),
//!         Vec3::new(10.0, 0.0, 0.0),
//!     ]))
//!     .unwrap();
//!
//! let courier = engine.spawn_agent("courier", Vec3::ZERO);
//! engine.start_agent(courier).unwrap();
//!
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for e in engine.drain_events() {
//!         println!("{:.2}s {:?}", e.time, e.event);
//!     }
//! }
//! ```

pub mod components;
pub mod engine;
pub mod persistence;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{EngineError, EngineEvent, NavigationEngine};
}
