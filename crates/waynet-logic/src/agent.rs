//! Traversal agent: a tick-driven state machine that walks a stop queue.
//!
//! ```text
//! Idle ─start─▶ Moving ─▶ Arrived ─▶ Visiting ───┬─▶ Moving (next stop)
//!                                 └▶ Delivering ─┘
//!                                                └─▶ RouteComplete ─(loop)─▶ Moving
//! ```
//!
//! Time only advances inside [`TraversalAgent::tick`]. Hops, dwells and the
//! loop-restart delay are all remaining-time counters, and leftover time in a
//! tick carries into the next phase, so hop timing does not depend on tick
//! size.
//!
//! The agent owns its planner and RNG. The graph is passed in on every call;
//! several agents can share one graph because marking a node visited is an
//! idempotent counter bump.
//!
//! Paths are checked against the graph generation at every hop boundary. A
//! stale path is dropped and recomputed from the node just reached; a hop
//! already in flight always finishes first.

use crate::config::AgentConfig;
use crate::events::{NavEvent, SkipReason};
use crate::geometry::{lerp_angle, Vec3, EPSILON};
use crate::graph::{NodeId, WaypointGraph};
use crate::planner::{Path, PathPlanner};
use crate::sequencer::{build_route, nearest_node};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slowest speed used when a non-positive speed slips through (m/s).
const MIN_SPEED: f32 = 0.01;

/// Traversal state tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Moving,
    Arrived,
    Visiting,
    Delivering,
    RouteComplete,
}

impl AgentState {
    /// States from which a new route or target may be accepted.
    pub fn accepts_commands(self) -> bool {
        matches!(self, AgentState::Idle | AgentState::RouteComplete)
    }
}

/// A request that is not valid in the agent's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// `start` while a route is in progress.
    AlreadyRunning(AgentState),
    /// A command that needs an idle agent arrived mid-route.
    Busy(AgentState),
    /// `stop` on an agent that is already idle.
    NotRunning,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::AlreadyRunning(s) => write!(f, "agent is already running ({:?})", s),
            StateError::Busy(s) => write!(f, "agent is busy ({:?})", s),
            StateError::NotRunning => write!(f, "agent is not running"),
        }
    }
}

impl std::error::Error for StateError {}

/// Where the current stop queue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteSource {
    /// Built by the sequencer; eligible for looping.
    Policy,
    /// A single `go_to` target; never loops.
    Direct,
}

/// One straight-line movement segment.
#[derive(Debug, Clone, Copy)]
struct Hop {
    node: NodeId,
    from: Vec3,
    to: Vec3,
    duration: f32,
    elapsed: f32,
    heading_from: f32,
    heading_to: f32,
}

/// Point-in-time progress summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub state: AgentState,
    pub percent: f32,
    pub remaining_stops: usize,
    pub total_distance: f32,
    pub current_target: Option<NodeId>,
}

/// Seconds needed to cover `distance` at `speed`.
pub fn hop_duration(distance: f32, speed: f32) -> f32 {
    distance / speed.max(MIN_SPEED)
}

/// Autonomous multi-stop traversal.
#[derive(Debug, Clone)]
pub struct TraversalAgent {
    config: AgentConfig,
    planner: PathPlanner,
    rng: StdRng,
    state: AgentState,
    position: Vec3,
    /// Yaw around +Y (radians).
    heading: f32,
    route: Vec<NodeId>,
    route_index: usize,
    route_source: RouteSource,
    /// Node the agent last reached; origin for the next path request.
    origin: Option<NodeId>,
    path: Option<Path>,
    /// Index into `path.nodes` of the node currently being approached.
    path_index: usize,
    hop: Option<Hop>,
    /// Remaining dwell or restart delay (s).
    timer: f32,
    total_distance: f32,
    completed_routes: u32,
    pending: Vec<NavEvent>,
}

impl TraversalAgent {
    pub fn new(position: Vec3, config: AgentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            planner: PathPlanner::new(),
            rng,
            state: AgentState::Idle,
            position,
            heading: 0.0,
            route: Vec::new(),
            route_index: 0,
            route_source: RouteSource::Policy,
            origin: None,
            path: None,
            path_index: 0,
            hop: None,
            timer: 0.0,
            total_distance: 0.0,
            completed_routes: 0,
            pending: Vec::new(),
        }
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Build a stop queue from the configured policy and begin traversal.
    ///
    /// Returns the number of stops queued. An empty queue leaves the agent
    /// idle and is not an error.
    pub fn start(&mut self, graph: &mut WaypointGraph) -> Result<usize, StateError> {
        if !self.state.accepts_commands() {
            return Err(StateError::AlreadyRunning(self.state));
        }
        self.route_source = RouteSource::Policy;
        Ok(self.begin_route(graph))
    }

    /// Travel to a single node, outside the configured route policy.
    pub fn go_to(&mut self, graph: &mut WaypointGraph, target: NodeId) -> Result<(), StateError> {
        if !self.state.accepts_commands() {
            return Err(StateError::Busy(self.state));
        }
        self.route_source = RouteSource::Direct;
        self.reset_route(vec![target]);
        self.pending.push(NavEvent::RouteStarted { stops: 1 });
        self.begin_stop(graph);
        Ok(())
    }

    /// Halt where the agent stands. Mid-hop the agent keeps its interpolated
    /// position; pending dwell and restart timers are dropped without
    /// emitting their completion events.
    pub fn stop(&mut self) -> Result<(), StateError> {
        if self.state == AgentState::Idle {
            return Err(StateError::NotRunning);
        }
        log::info!(
            "Agent stopped in {:?} at ({:.2}, {:.2}, {:.2})",
            self.state,
            self.position.x,
            self.position.y,
            self.position.z
        );
        self.state = AgentState::Idle;
        self.route.clear();
        self.route_index = 0;
        self.origin = None;
        self.path = None;
        self.hop = None;
        self.timer = 0.0;
        Ok(())
    }

    /// Replace the configuration. Only allowed between routes.
    pub fn set_config(&mut self, config: AgentConfig) -> Result<(), StateError> {
        if !self.state.accepts_commands() {
            return Err(StateError::Busy(self.state));
        }
        if let Some(seed) = config.seed.filter(|_| config.seed != self.config.seed) {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.config = config;
        Ok(())
    }

    /// Place the agent. Only allowed between routes.
    pub fn set_position(&mut self, position: Vec3) -> Result<(), StateError> {
        if !self.state.accepts_commands() {
            return Err(StateError::Busy(self.state));
        }
        self.position = position;
        self.origin = None;
        Ok(())
    }

    /// Advance by `delta` seconds and return the events that occurred,
    /// including any raised by commands since the previous tick.
    pub fn tick(&mut self, graph: &mut WaypointGraph, delta: f32) -> Vec<NavEvent> {
        let mut remaining = delta.max(0.0);
        let mut restarted = false;

        loop {
            match self.state {
                AgentState::Idle => break,
                AgentState::Moving => {
                    remaining = self.advance_movement(graph, remaining);
                    if self.state == AgentState::Moving {
                        break;
                    }
                }
                AgentState::Arrived => self.handle_arrival(graph),
                AgentState::Visiting | AgentState::Delivering => {
                    if self.timer > remaining {
                        self.timer -= remaining;
                        break;
                    }
                    remaining -= self.timer;
                    self.timer = 0.0;
                    self.finish_dwell(graph);
                }
                AgentState::RouteComplete => {
                    if restarted || !self.loops() {
                        break;
                    }
                    if self.timer > remaining {
                        self.timer -= remaining;
                        break;
                    }
                    remaining -= self.timer;
                    self.timer = 0.0;
                    restarted = true;
                    self.begin_route(graph);
                }
            }
        }

        std::mem::take(&mut self.pending)
    }

    // ── Introspection ───────────────────────────────────────────────────

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current stop queue.
    pub fn route(&self) -> &[NodeId] {
        &self.route
    }

    pub fn current_target(&self) -> Option<NodeId> {
        match self.state {
            AgentState::Idle | AgentState::RouteComplete => None,
            _ => self.route.get(self.route_index).copied(),
        }
    }

    /// Nodes of the path being walked, if any.
    pub fn current_path(&self) -> Option<&[NodeId]> {
        self.path.as_ref().map(|p| p.nodes.as_slice())
    }

    /// Share of the stop queue already handled (reached or skipped).
    pub fn progress_percent(&self) -> f32 {
        match self.state {
            AgentState::RouteComplete => 100.0,
            _ if self.route.is_empty() => 0.0,
            _ => self.route_index as f32 / self.route.len() as f32 * 100.0,
        }
    }

    /// Stops not yet handled, including the one currently targeted.
    pub fn remaining_stops(&self) -> usize {
        match self.state {
            AgentState::Idle | AgentState::RouteComplete => 0,
            _ => self.route.len().saturating_sub(self.route_index),
        }
    }

    /// Metres travelled since construction.
    pub fn total_distance(&self) -> f32 {
        self.total_distance
    }

    pub fn completed_routes(&self) -> u32 {
        self.completed_routes
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.state,
            percent: self.progress_percent(),
            remaining_stops: self.remaining_stops(),
            total_distance: self.total_distance,
            current_target: self.current_target(),
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn loops(&self) -> bool {
        self.config.loop_route && self.route_source == RouteSource::Policy
    }

    fn reset_route(&mut self, route: Vec<NodeId>) {
        self.route = route;
        self.route_index = 0;
        self.path = None;
        self.hop = None;
        self.timer = 0.0;
    }

    /// Sequence a fresh stop queue and start on its first stop.
    fn begin_route(&mut self, graph: &mut WaypointGraph) -> usize {
        let route = build_route(
            graph,
            self.config.visit_mode,
            self.config.traverse_mode,
            &self.config.custom_route,
            self.position,
            &mut self.rng,
        );
        if route.is_empty() {
            log::warn!("Agent has no stops to visit, staying idle");
            self.reset_route(route);
            self.state = AgentState::Idle;
            return 0;
        }

        let stops = route.len();
        log::info!("Agent starting route with {} stops", stops);
        self.reset_route(route);
        self.origin = nearest_node(graph, self.position);
        self.pending.push(NavEvent::RouteStarted { stops });
        self.begin_stop(graph);
        stops
    }

    /// Plan a path to the current stop, skipping unreachable stops, or
    /// complete the route when the queue is exhausted.
    fn begin_stop(&mut self, graph: &mut WaypointGraph) {
        while let Some(&target) = self.route.get(self.route_index) {
            let origin = match self.origin.filter(|&id| graph.contains(id)) {
                Some(id) => Some(id),
                None => nearest_node(graph, self.position),
            };
            let Some(origin) = origin else {
                self.skip_stop(target, SkipReason::NoOrigin);
                continue;
            };
            self.origin = Some(origin);

            match self.planner.calculate_path(graph, origin, target) {
                Ok(path) => {
                    log::debug!("Path to #{}: {:?}", target, path.nodes);
                    self.path = Some(path);
                    self.path_index = 0;
                    self.state = AgentState::Moving;
                    self.start_hop(graph);
                    return;
                }
                Err(e) => {
                    log::warn!("Skipping stop #{}: {}", target, e);
                    self.skip_stop(target, e.into());
                }
            }
        }
        self.complete_route(graph);
    }

    fn skip_stop(&mut self, node: NodeId, reason: SkipReason) {
        self.pending.push(NavEvent::StopSkipped { node, reason });
        self.route_index += 1;
    }

    /// Set up the hop toward `path.nodes[path_index]`.
    fn start_hop(&mut self, graph: &WaypointGraph) {
        let Some(node) = self
            .path
            .as_ref()
            .and_then(|p| p.nodes.get(self.path_index).copied())
        else {
            self.hop = None;
            return;
        };
        // Missing after a rebuild: zero-length hop, re-planned at the boundary
        let to = graph.position(node).unwrap_or(self.position);
        let distance = self.position.distance(&to);
        self.hop = Some(Hop {
            node,
            from: self.position,
            to,
            duration: hop_duration(distance, self.config.move_speed),
            elapsed: 0.0,
            heading_from: self.heading,
            heading_to: self.position.heading_to(&to).unwrap_or(self.heading),
        });
    }

    /// Consume up to `remaining` seconds of movement. Returns leftover time.
    fn advance_movement(&mut self, graph: &mut WaypointGraph, mut remaining: f32) -> f32 {
        while let Some(mut hop) = self.hop {
            let needed = hop.duration - hop.elapsed;
            if remaining < needed {
                hop.elapsed += remaining;
                self.hop = Some(hop);
                self.move_along(&hop);
                return 0.0;
            }

            remaining -= needed;
            hop.elapsed = hop.duration;
            self.move_along(&hop);
            self.origin = Some(hop.node);

            let last = self
                .path
                .as_ref()
                .map_or(true, |p| self.path_index + 1 >= p.nodes.len());
            if last {
                self.hop = None;
                self.path = None;
                self.state = AgentState::Arrived;
                return remaining;
            }

            if hop.from.distance(&hop.to) > EPSILON {
                self.pending.push(NavEvent::WaypointReached { node: hop.node });
            }

            if self.path.as_ref().is_some_and(|p| p.is_stale(graph)) {
                log::info!("Waypoint network changed, re-planning from #{}", hop.node);
                self.hop = None;
                self.path = None;
                self.begin_stop(graph);
                if self.state != AgentState::Moving {
                    return remaining;
                }
                continue;
            }

            self.path_index += 1;
            self.start_hop(graph);
        }

        // Nothing left to walk
        if self.state == AgentState::Moving {
            self.state = AgentState::Arrived;
        }
        remaining
    }

    /// Place the agent according to the hop's elapsed time.
    fn move_along(&mut self, hop: &Hop) {
        let t = if hop.duration > 0.0 {
            hop.elapsed / hop.duration
        } else {
            1.0
        };
        let next = hop.from.lerp(&hop.to, t);
        self.total_distance += self.position.distance(&next);
        self.position = next;

        let turn_time = hop.duration * self.config.rotation_fraction;
        let turn_t = if turn_time > 0.0 {
            hop.elapsed / turn_time
        } else {
            1.0
        };
        self.heading = lerp_angle(hop.heading_from, hop.heading_to, turn_t);
    }

    fn handle_arrival(&mut self, graph: &mut WaypointGraph) {
        let Some(node) = self.route.get(self.route_index).copied() else {
            self.complete_route(graph);
            return;
        };

        if !graph.contains(node) {
            log::warn!("Stop #{} vanished before arrival", node);
            self.skip_stop(node, SkipReason::UnknownNode);
            self.begin_stop(graph);
            return;
        }

        match graph.mark_visited(node) {
            Ok(outcome) => {
                self.pending.push(NavEvent::NodeVisited {
                    node,
                    visit_count: outcome.visit_count,
                });
                if outcome.completed_all {
                    self.pending.push(NavEvent::AllNodesVisited);
                }
            }
            Err(e) => log::warn!("Could not mark #{} visited: {}", node, e),
        }
        self.pending.push(NavEvent::ArrivedAtDestination { node });

        let is_delivery = graph.get_node(node).is_some_and(|n| n.is_delivery_point);
        if is_delivery {
            self.state = AgentState::Delivering;
            self.timer = self.config.delivery_time.max(0.0);
            self.pending.push(NavEvent::StartedDelivery { node });
        } else {
            self.state = AgentState::Visiting;
            self.timer = self.config.visit_time.max(0.0);
        }
    }

    fn finish_dwell(&mut self, graph: &mut WaypointGraph) {
        if self.state == AgentState::Delivering {
            if let Some(&node) = self.route.get(self.route_index) {
                self.pending.push(NavEvent::CompletedDelivery { node });
            }
        }
        self.route_index += 1;
        self.begin_stop(graph);
    }

    fn complete_route(&mut self, graph: &mut WaypointGraph) {
        self.state = AgentState::RouteComplete;
        self.path = None;
        self.hop = None;
        self.completed_routes += 1;
        self.pending.push(NavEvent::CompletedFullRoute);

        if self.loops() {
            graph.reset_visited();
            self.timer = self.config.restart_delay.max(0.0);
            log::info!(
                "Route complete, restarting in {:.1}s",
                self.config.restart_delay
            );
        } else {
            self.timer = 0.0;
            log::info!("Route complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{TraverseMode, VisitMode};

    fn line() -> WaypointGraph {
        // 0 --10-- 1 --15-- 2
        let mut g = WaypointGraph::new();
        g.register_node(None, Vec3::new(0.0, 0.0, 0.0), false).unwrap();
        g.register_node(None, Vec3::new(10.0, 0.0, 0.0), false).unwrap();
        g.register_node(None, Vec3::new(25.0, 0.0, 0.0), true).unwrap();
        g.connect(0, 1).unwrap();
        g.connect(1, 2).unwrap();
        g
    }

    fn config() -> AgentConfig {
        AgentConfig {
            move_speed: 5.0,
            visit_time: 1.0,
            delivery_time: 2.0,
            restart_delay: 1.5,
            seed: Some(7),
            ..Default::default()
        }
    }

    fn custom(route: &[NodeId]) -> AgentConfig {
        AgentConfig {
            visit_mode: VisitMode::Custom,
            custom_route: route.to_vec(),
            ..config()
        }
    }

    fn run(agent: &mut TraversalAgent, g: &mut WaypointGraph, dt: f32, steps: usize) -> Vec<NavEvent> {
        let mut events = Vec::new();
        for _ in 0..steps {
            events.extend(agent.tick(g, dt));
        }
        events
    }

    #[test]
    fn test_hop_duration() {
        assert!((hop_duration(10.0, 5.0) - 2.0).abs() < 1e-6);
        assert!((hop_duration(15.0, 5.0) - 3.0).abs() < 1e-6);
        assert!(hop_duration(1.0, 0.0).is_finite());
    }

    #[test]
    fn test_starts_idle() {
        let agent = TraversalAgent::new(Vec3::ZERO, config());
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(agent.progress_percent(), 0.0);
        assert_eq!(agent.remaining_stops(), 0);
    }

    #[test]
    fn test_go_to_walks_path_with_hop_timing() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, config());
        agent.go_to(&mut g, 2).unwrap();
        assert_eq!(agent.state(), AgentState::Moving);
        assert_eq!(agent.current_path(), Some(&[0, 1, 2][..]));

        // A→B takes 2.0s
        let events = run(&mut agent, &mut g, 0.5, 3);
        assert!(!events.contains(&NavEvent::WaypointReached { node: 1 }));
        let events = agent.tick(&mut g, 0.5);
        assert!(events.contains(&NavEvent::WaypointReached { node: 1 }));
        assert!((agent.position().x - 10.0).abs() < 1e-4);

        // B→C takes 3.0s
        let events = run(&mut agent, &mut g, 0.5, 5);
        assert!(!events.contains(&NavEvent::ArrivedAtDestination { node: 2 }));
        let events = agent.tick(&mut g, 0.5);
        assert!(events.contains(&NavEvent::ArrivedAtDestination { node: 2 }));
        assert!((agent.position().x - 25.0).abs() < 1e-4);
        assert!((agent.total_distance() - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_large_tick_carries_time_across_hops() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, config());
        agent.go_to(&mut g, 2).unwrap();
        // One 5s tick covers both hops exactly
        let events = agent.tick(&mut g, 5.0);
        assert!(events.contains(&NavEvent::ArrivedAtDestination { node: 2 }));
        assert_eq!(agent.state(), AgentState::Delivering);
    }

    #[test]
    fn test_delivery_dwell_events() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::new(25.0, 0.0, 0.0), custom(&[2]));
        agent.start(&mut g).unwrap();
        let events = agent.tick(&mut g, 0.0);
        assert_eq!(
            events,
            vec![
                NavEvent::RouteStarted { stops: 1 },
                NavEvent::NodeVisited { node: 2, visit_count: 1 },
                NavEvent::ArrivedAtDestination { node: 2 },
                NavEvent::StartedDelivery { node: 2 },
            ]
        );
        assert_eq!(agent.state(), AgentState::Delivering);

        let events = agent.tick(&mut g, 1.9);
        assert!(events.is_empty());
        let events = agent.tick(&mut g, 0.2);
        assert_eq!(
            events,
            vec![
                NavEvent::CompletedDelivery { node: 2 },
                NavEvent::CompletedFullRoute,
            ]
        );
        assert_eq!(agent.state(), AgentState::RouteComplete);
        assert_eq!(agent.progress_percent(), 100.0);
    }

    #[test]
    fn test_visit_dwell_for_plain_node() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[0, 1]));
        agent.start(&mut g).unwrap();
        agent.tick(&mut g, 0.0);
        assert_eq!(agent.state(), AgentState::Visiting);
        assert_eq!(agent.remaining_stops(), 2);
        assert!((agent.progress_percent() - 0.0).abs() < 1e-6);
        agent.tick(&mut g, 1.0);
        assert_eq!(agent.state(), AgentState::Moving);
        assert_eq!(agent.remaining_stops(), 1);
        assert!((agent.progress_percent() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_unreachable_stop_is_skipped() {
        let mut g = line();
        g.register_node(Some(9), Vec3::new(100.0, 0.0, 0.0), false).unwrap();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[9, 1]));
        agent.start(&mut g).unwrap();
        let events = agent.tick(&mut g, 0.0);
        assert!(events.contains(&NavEvent::StopSkipped {
            node: 9,
            reason: SkipReason::NoPath
        }));
        assert_eq!(agent.state(), AgentState::Moving);
        assert_eq!(agent.current_target(), Some(1));

        let events = run(&mut agent, &mut g, 0.5, 4);
        assert!(events.contains(&NavEvent::ArrivedAtDestination { node: 1 }));
    }

    #[test]
    fn test_unknown_stop_is_skipped() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[42]));
        agent.start(&mut g).unwrap();
        let events = agent.tick(&mut g, 0.0);
        assert!(events.contains(&NavEvent::StopSkipped {
            node: 42,
            reason: SkipReason::UnknownNode
        }));
        assert_eq!(agent.state(), AgentState::RouteComplete);
    }

    #[test]
    fn test_empty_graph_stays_idle() {
        let mut g = WaypointGraph::new();
        let mut agent = TraversalAgent::new(Vec3::ZERO, config());
        assert_eq!(agent.start(&mut g), Ok(0));
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.tick(&mut g, 1.0).is_empty());
    }

    #[test]
    fn test_state_errors() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[2]));
        assert_eq!(agent.stop(), Err(StateError::NotRunning));
        agent.start(&mut g).unwrap();
        assert_eq!(agent.start(&mut g), Err(StateError::AlreadyRunning(AgentState::Moving)));

        agent.tick(&mut g, 5.0);
        assert_eq!(agent.state(), AgentState::Delivering);
        // Rejected; the delivery carries on
        assert_eq!(agent.go_to(&mut g, 0), Err(StateError::Busy(AgentState::Delivering)));
        assert_eq!(agent.set_position(Vec3::ZERO), Err(StateError::Busy(AgentState::Delivering)));
        let events = agent.tick(&mut g, 2.0);
        assert!(events.contains(&NavEvent::CompletedDelivery { node: 2 }));
    }

    #[test]
    fn test_stop_mid_hop_freezes_position() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[1]));
        agent.start(&mut g).unwrap();
        agent.tick(&mut g, 1.0);
        let frozen = agent.position();
        assert!((frozen.x - 5.0).abs() < 1e-4);

        agent.stop().unwrap();
        assert_eq!(agent.state(), AgentState::Idle);
        assert!(agent.tick(&mut g, 10.0).is_empty());
        assert_eq!(agent.position(), frozen);

        // Equidistant from 0 and 1, so the restart resolves to 0 and walks
        // back to it (1s) before the 2s hop to 1
        agent.start(&mut g).unwrap();
        let events = run(&mut agent, &mut g, 0.5, 5);
        assert!(events.contains(&NavEvent::WaypointReached { node: 0 }));
        assert!(!events.contains(&NavEvent::ArrivedAtDestination { node: 1 }));
        let events = agent.tick(&mut g, 0.5);
        assert!(events.contains(&NavEvent::ArrivedAtDestination { node: 1 }));
    }

    #[test]
    fn test_stop_during_dwell_cancels_without_events() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::new(25.0, 0.0, 0.0), custom(&[2]));
        agent.start(&mut g).unwrap();
        agent.tick(&mut g, 0.5);
        assert_eq!(agent.state(), AgentState::Delivering);
        agent.stop().unwrap();
        let events = agent.tick(&mut g, 5.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_loop_restart_resets_visited() {
        let mut g = line();
        let mut cfg = custom(&[0, 1]);
        cfg.loop_route = true;
        let mut agent = TraversalAgent::new(Vec3::ZERO, cfg);
        agent.start(&mut g).unwrap();

        // 0: arrive + 1s visit, 2s hop, 1s visit at 1
        let events = run(&mut agent, &mut g, 0.5, 8);
        assert!(events.contains(&NavEvent::CompletedFullRoute));
        assert_eq!(agent.state(), AgentState::RouteComplete);
        assert!(g.all_nodes().all(|n| !n.visited));

        // Restart after 1.5s
        let events = run(&mut agent, &mut g, 0.5, 2);
        assert!(!events.iter().any(|e| matches!(e, NavEvent::RouteStarted { .. })));
        let events = agent.tick(&mut g, 0.5);
        assert!(events.contains(&NavEvent::RouteStarted { stops: 2 }));
        assert_eq!(agent.completed_routes(), 1);
    }

    #[test]
    fn test_go_to_does_not_loop() {
        let mut g = line();
        let mut cfg = config();
        cfg.loop_route = true;
        cfg.restart_delay = 0.0;
        let mut agent = TraversalAgent::new(Vec3::ZERO, cfg);
        agent.go_to(&mut g, 1).unwrap();
        run(&mut agent, &mut g, 0.5, 10);
        assert_eq!(agent.state(), AgentState::RouteComplete);
        assert!(agent.tick(&mut g, 5.0).is_empty());
    }

    #[test]
    fn test_all_nodes_visited_emitted_once() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, config());
        agent.start(&mut g).unwrap();
        let events = run(&mut agent, &mut g, 0.25, 60);
        let count = events
            .iter()
            .filter(|e| **e == NavEvent::AllNodesVisited)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_stale_path_replanned_at_boundary() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[2]));
        agent.start(&mut g).unwrap();
        agent.tick(&mut g, 1.0);

        // Reroute 1→2 through a detour while the hop to 1 is in flight
        g.register_node(Some(5), Vec3::new(10.0, 0.0, 5.0), false).unwrap();
        g.clear_connections();
        g.connect(0, 1).unwrap();
        g.connect(1, 5).unwrap();
        g.connect(5, 2).unwrap();

        let events = agent.tick(&mut g, 1.0);
        assert!(events.contains(&NavEvent::WaypointReached { node: 1 }));
        assert_eq!(agent.current_path(), Some(&[1, 5, 2][..]));
    }

    #[test]
    fn test_target_removed_during_final_hop_is_skipped() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[1, 0]));
        agent.start(&mut g).unwrap();
        agent.tick(&mut g, 1.0);

        // Rebuild without the stop the agent is walking to
        g.clear();
        g.register_node(Some(0), Vec3::new(0.0, 0.0, 0.0), false).unwrap();
        g.register_node(Some(2), Vec3::new(25.0, 0.0, 0.0), true).unwrap();
        g.connect(0, 2).unwrap();

        let events = agent.tick(&mut g, 1.5);
        assert!(events.contains(&NavEvent::StopSkipped {
            node: 1,
            reason: SkipReason::UnknownNode,
        }));
        assert!(!events.contains(&NavEvent::ArrivedAtDestination { node: 1 }));
        assert!(!events.iter().any(|e| matches!(e, NavEvent::NodeVisited { node: 1, .. })));
        assert_eq!(agent.state(), AgentState::Moving);

        let events = run(&mut agent, &mut g, 0.5, 6);
        assert!(events.contains(&NavEvent::ArrivedAtDestination { node: 0 }));
    }

    #[test]
    fn test_heading_turns_toward_travel_direction() {
        let mut g = line();
        let mut agent = TraversalAgent::new(Vec3::ZERO, custom(&[1]));
        agent.start(&mut g).unwrap();
        // Rotation completes in the first 25% of a 2s hop
        agent.tick(&mut g, 0.25);
        let half = agent.heading();
        agent.tick(&mut g, 0.5);
        let done = agent.heading();
        assert!(half > 0.0 && half < std::f32::consts::FRAC_PI_2);
        assert!((done - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn test_shortest_path_heuristic_order() {
        let mut g = line();
        let cfg = AgentConfig {
            traverse_mode: TraverseMode::ShortestPathHeuristic,
            ..config()
        };
        let mut agent = TraversalAgent::new(Vec3::new(26.0, 0.0, 0.0), cfg);
        agent.start(&mut g).unwrap();
        assert_eq!(agent.route(), &[2, 1, 0]);
    }
}
