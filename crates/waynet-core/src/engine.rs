//! Navigation engine - main entry point for running multi-agent traversal

use hecs::{Entity, World};
use std::fmt;
use waynet_logic::agent::{Progress, StateError, TraversalAgent};
use waynet_logic::config::{AgentConfig, NavConfig};
use waynet_logic::events::NavEvent;
use waynet_logic::geometry::Vec3;
use waynet_logic::graph::{Issue, NodeId, WaypointGraph};
use waynet_logic::topology::{
    configure_network, ConfigurationError, TopologyConfig, TopologyReport, WaypointRecord,
};

use crate::components::*;
use crate::persistence::{self, SaveData, SaveError, SavedAgent};
use crate::systems::*;

/// An event stamped with when it happened and which agent raised it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineEvent {
    /// Simulated seconds since start
    pub time: f64,
    /// `None` for network-level events
    pub agent: Option<Entity>,
    pub event: NavEvent,
}

/// Errors from commands addressed to agents or the network
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The entity is not a live agent
    UnknownAgent(Entity),
    State(StateError),
    Network(ConfigurationError),
}

impl From<StateError> for EngineError {
    fn from(e: StateError) -> Self {
        EngineError::State(e)
    }
}

impl From<ConfigurationError> for EngineError {
    fn from(e: ConfigurationError) -> Self {
        EngineError::Network(e)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::UnknownAgent(e) => write!(f, "no agent with entity id {}", e.id()),
            EngineError::State(e) => write!(f, "{}", e),
            EngineError::Network(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Main navigation engine
pub struct NavigationEngine {
    /// ECS world containing all agents
    pub world: World,
    /// Waypoint network shared by every agent
    pub graph: WaypointGraph,
    /// Records the current network was built from
    records: Vec<WaypointRecord>,
    config: NavConfig,
    /// Simulated seconds since start
    sim_time: f64,
    time_scale: f32,
    events: Vec<EngineEvent>,
    /// Agents spawned so far, used to vary seeds
    spawned: u64,
}

impl NavigationEngine {
    /// Create an engine with no network and no agents
    pub fn new(config: NavConfig) -> Self {
        Self {
            world: World::new(),
            graph: WaypointGraph::new(),
            records: Vec::new(),
            config,
            sim_time: 0.0,
            time_scale: 1.0,
            events: Vec::new(),
            spawned: 0,
        }
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Replace the waypoint network.
    ///
    /// Running agents keep going; their paths are re-planned at the next hop
    /// boundary because the graph generation changes.
    pub fn configure_network(
        &mut self,
        records: Vec<WaypointRecord>,
    ) -> Result<TopologyReport, ConfigurationError> {
        let result = configure_network(&mut self.graph, &records, &self.config.network);
        self.records = records;
        let report = result?;
        self.push_event(None, NavEvent::NetworkConfigured {
            node_count: report.node_count,
        });
        Ok(report)
    }

    /// Rebuild the current records with new topology settings.
    pub fn reconfigure(
        &mut self,
        network: TopologyConfig,
    ) -> Result<TopologyReport, ConfigurationError> {
        self.config.network = network;
        let records = std::mem::take(&mut self.records);
        self.configure_network(records)
    }

    /// Structural warnings for the current network.
    pub fn validate_network(&self) -> Vec<Issue> {
        self.graph.validate()
    }

    /// Spawn an idle agent with the engine's default agent settings.
    ///
    /// With a configured seed each agent gets `seed + n`, so random orders
    /// differ between agents but stay reproducible.
    pub fn spawn_agent(&mut self, name: &str, position: Vec3) -> Entity {
        let mut config = self.config.agent.clone();
        config.seed = config.seed.map(|s| s.wrapping_add(self.spawned));
        self.spawn_agent_with(name, position, config)
    }

    /// Spawn an idle agent with its own settings.
    pub fn spawn_agent_with(&mut self, name: &str, position: Vec3, config: AgentConfig) -> Entity {
        self.spawned += 1;
        let agent = TraversalAgent::new(position, config);
        let entity = self
            .world
            .spawn((Name::new(name), Navigator::new(agent), AgentStats::default()));
        log::info!("Spawned agent '{}' (entity {})", name, entity.id());
        entity
    }

    pub fn despawn_agent(&mut self, entity: Entity) -> Result<(), EngineError> {
        self.navigator(entity)?;
        self.world
            .despawn(entity)
            .map_err(|_| EngineError::UnknownAgent(entity))
    }

    /// Build the agent's route and begin traversal. Returns the stop count.
    pub fn start_agent(&mut self, entity: Entity) -> Result<usize, EngineError> {
        let mut nav = self
            .world
            .get::<&mut Navigator>(entity)
            .map_err(|_| EngineError::UnknownAgent(entity))?;
        Ok(nav.agent.start(&mut self.graph)?)
    }

    /// Start every idle agent. Returns how many started.
    pub fn start_all(&mut self) -> usize {
        let mut started = 0;
        for (_, nav) in self.world.query_mut::<&mut Navigator>() {
            if nav.agent.state().accepts_commands() && nav.agent.start(&mut self.graph).is_ok() {
                started += 1;
            }
        }
        started
    }

    pub fn stop_agent(&mut self, entity: Entity) -> Result<(), EngineError> {
        let mut nav = self
            .world
            .get::<&mut Navigator>(entity)
            .map_err(|_| EngineError::UnknownAgent(entity))?;
        Ok(nav.agent.stop()?)
    }

    /// Send an idle agent to a single node.
    pub fn go_to(&mut self, entity: Entity, target: NodeId) -> Result<(), EngineError> {
        let mut nav = self
            .world
            .get::<&mut Navigator>(entity)
            .map_err(|_| EngineError::UnknownAgent(entity))?;
        Ok(nav.agent.go_to(&mut self.graph, target)?)
    }

    /// Advance the simulation by `delta_seconds` of real time
    pub fn update(&mut self, delta_seconds: f32) {
        let scaled_delta = delta_seconds * self.time_scale;
        self.sim_time += scaled_delta as f64;

        let events = traversal_system(&mut self.world, &mut self.graph, scaled_delta);
        stats_system(&mut self.world, &events);

        for (entity, event) in events {
            self.push_event(Some(entity), event);
        }
    }

    /// Take all events recorded since the last drain, oldest first
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn agent_progress(&self, entity: Entity) -> Result<Progress, EngineError> {
        Ok(self.navigator(entity)?.agent.progress())
    }

    pub fn agent_stats(&self, entity: Entity) -> Result<AgentStats, EngineError> {
        self.world
            .get::<&AgentStats>(entity)
            .map(|s| *s)
            .map_err(|_| EngineError::UnknownAgent(entity))
    }

    pub fn agent_position(&self, entity: Entity) -> Result<Vec3, EngineError> {
        Ok(self.navigator(entity)?.agent.position())
    }

    /// Look up an agent by name (first match in entity id order)
    pub fn find_agent(&self, name: &str) -> Option<Entity> {
        self.agents()
            .into_iter()
            .find(|(_, n)| n == name)
            .map(|(e, _)| e)
    }

    /// All agents with their names, in entity id order
    pub fn agents(&self) -> Vec<(Entity, String)> {
        let mut agents: Vec<(Entity, String)> = self
            .world
            .query::<(&Name, &Navigator)>()
            .iter()
            .map(|(entity, (name, _))| (entity, name.0.clone()))
            .collect();
        agents.sort_by_key(|(e, _)| e.id());
        agents
    }

    pub fn agent_count(&self) -> usize {
        self.world.query::<&Navigator>().iter().count()
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Simulated seconds since start
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Save engine state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        let agents = self
            .agents()
            .into_iter()
            .filter_map(|(entity, name)| {
                let nav = self.world.get::<&Navigator>(entity).ok()?;
                let stats = self.agent_stats(entity).unwrap_or_default();
                Some(SavedAgent {
                    name,
                    position: nav.agent.position(),
                    config: nav.agent.config().clone(),
                    stats,
                })
            })
            .collect();

        let data = SaveData::new(
            self.sim_time,
            self.time_scale,
            self.config.clone(),
            self.records.clone(),
            persistence::node_visits(&self.graph),
            agents,
        );
        persistence::save_snapshot(writer, &data)
    }

    /// Load engine state from a reader, replacing everything
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let data = persistence::load_snapshot(reader)?;

        let mut graph = WaypointGraph::new();
        if !data.records.is_empty() {
            configure_network(&mut graph, &data.records, &data.config.network)?;
            persistence::restore_visits(&mut graph, &data.visits);
        }

        self.world = World::new();
        self.graph = graph;
        self.records = data.records;
        self.config = data.config;
        self.sim_time = data.sim_time;
        self.time_scale = data.time_scale;
        self.events.clear();
        self.spawned = 0;

        for saved in data.agents {
            let entity = self.spawn_agent_with(&saved.name, saved.position, saved.config);
            if let Ok(mut stats) = self.world.get::<&mut AgentStats>(entity) {
                *stats = saved.stats;
            }
        }

        log::info!(
            "Loaded snapshot: {} nodes, {} agents at t={:.1}s",
            self.graph.node_count(),
            self.agent_count(),
            self.sim_time
        );
        Ok(())
    }

    fn navigator(&self, entity: Entity) -> Result<hecs::Ref<'_, Navigator>, EngineError> {
        self.world
            .get::<&Navigator>(entity)
            .map_err(|_| EngineError::UnknownAgent(entity))
    }

    fn push_event(&mut self, agent: Option<Entity>, event: NavEvent) {
        self.events.push(EngineEvent {
            time: self.sim_time,
            agent,
            event,
        });
    }
}

impl Default for NavigationEngine {
    fn default() -> Self {
        Self::new(NavConfig::default())
    }
}
