//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to agent entities.
//! Behavior lives in systems and in `waynet_logic::agent`.

mod navigation;

pub use navigation::*;
