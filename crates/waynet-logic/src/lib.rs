//! Pure navigation logic for Waynet.
//!
//! This crate contains the waypoint network, path planning and the
//! traversal state machine, independent of any engine or runtime. Functions
//! take plain data and return results, making them unit-testable and usable
//! from the ECS engine, the headless harness, or any other host.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`agent`] | Tick-driven traversal state machine (move, visit, deliver, loop) |
//! | [`config`] | Network and agent settings with validation |
//! | [`events`] | Semantic events emitted by agents |
//! | [`geometry`] | Ground-plane vectors, extents and heading helpers |
//! | [`graph`] | Waypoint nodes, directed connections and visit bookkeeping |
//! | [`planner`] | A* shortest paths with a generation-checked cache |
//! | [`sequencer`] | Stop selection and ordering (sequential, random, greedy) |
//! | [`topology`] | Network construction and layout auto-detection |

pub mod agent;
pub mod config;
pub mod events;
pub mod geometry;
pub mod graph;
pub mod planner;
pub mod sequencer;
pub mod topology;

pub use agent::{AgentState, StateError, TraversalAgent};
pub use graph::{NodeId, WaypointGraph};
