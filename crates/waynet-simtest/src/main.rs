//! Waynet Headless Simulation Harness
//!
//! Validates navigation logic and replays JSON scenarios without any
//! rendering. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p waynet-simtest
//!   cargo run -p waynet-simtest -- --verbose
//!   cargo run -p waynet-simtest -- --scenario path/to/scenario.json
//!
//! Log output is controlled with `RUST_LOG` (default `info`).

use serde::Deserialize;
use waynet_core::engine::NavigationEngine;
use waynet_logic::agent::{AgentState, TraversalAgent};
use waynet_logic::config::{validate_config, AgentConfig, NavConfig};
use waynet_logic::events::{NavEvent, SkipReason};
use waynet_logic::geometry::Vec3;
use waynet_logic::graph::{NodeId, WaypointGraph};
use waynet_logic::planner::{calculate_path, path_length, PathError};
use waynet_logic::sequencer::{greedy_order, VisitMode};
use waynet_logic::topology::{
    build_network, records_from_positions, TopologyConfig, TopologyMode, WaypointRecord,
};

// ── Bundled scenarios ───────────────────────────────────────────────────
const BUILTIN_SCENARIOS: [(&str, &str); 3] = [
    (
        "warehouse_grid.json",
        include_str!("../../../data/warehouse_grid.json"),
    ),
    (
        "corridor_loop.json",
        include_str!("../../../data/corridor_loop.json"),
    ),
    (
        "split_campus.json",
        include_str!("../../../data/split_campus.json"),
    ),
];

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[serde(default)]
    config: NavConfig,
    waypoints: Vec<WaypointRecord>,
    agents: Vec<ScenarioAgent>,
    duration: f32,
    #[serde(default = "default_time_step")]
    time_step: f32,
    #[serde(default)]
    expect: Expectations,
}

#[derive(Debug, Deserialize)]
struct ScenarioAgent {
    name: String,
    position: Vec3,
    /// Overrides the scenario-wide agent settings
    #[serde(default)]
    config: Option<AgentConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Expectations {
    mode: Option<TopologyMode>,
    arrivals: Option<u32>,
    deliveries: Option<u32>,
    skipped: Option<u32>,
    min_routes_completed: Option<u32>,
    all_nodes_visited: Option<bool>,
}

fn default_time_step() -> f32 {
    0.1
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let extra_scenarios: Vec<&String> = args
        .windows(2)
        .filter(|w| w[0] == "--scenario")
        .map(|w| &w[1])
        .collect();

    println!("=== Waynet Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Topology synthesis properties
    results.extend(validate_topology(verbose));

    // 2. A* pathfinding
    results.extend(validate_pathfinding(verbose));

    // 3. Route sequencing
    results.extend(validate_sequencing(verbose));

    // 4. Traversal state machine scenarios
    results.extend(validate_traversal(verbose));

    // 5. Multi-agent engine and persistence
    results.extend(validate_engine(verbose));

    // 6. Scenario replay
    println!("--- Scenarios ---");
    for (file, json) in BUILTIN_SCENARIOS {
        results.extend(replay_json(file, json, verbose));
    }
    for path in extra_scenarios {
        match std::fs::read_to_string(path) {
            Ok(json) => results.extend(replay_json(path, &json, verbose)),
            Err(e) => results.push(TestResult {
                name: format!("scenario_read:{}", path),
                passed: false,
                detail: format!("cannot read file: {}", e),
            }),
        }
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

/// Deterministic scatter without an RNG dependency.
fn scatter(count: usize) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let f = i as f32;
            Vec3::new((f * 37.0) % 53.0, 0.0, (f * 11.0 + 5.0) % 29.0)
        })
        .collect()
}

fn grid(side: usize, spacing: f32) -> Vec<Vec3> {
    (0..side * side)
        .map(|i| Vec3::new((i % side) as f32 * spacing, 0.0, (i / side) as f32 * spacing))
        .collect()
}

fn topology(mode: TopologyMode) -> TopologyConfig {
    TopologyConfig {
        mode,
        ..Default::default()
    }
}

fn network(positions: &[Vec3], mode: TopologyMode) -> Option<WaypointGraph> {
    build_network(&records_from_positions(positions), &topology(mode))
        .ok()
        .map(|(g, _)| g)
}

fn is_symmetric(graph: &WaypointGraph) -> bool {
    graph.all_nodes().all(|n| {
        n.connections.iter().all(|&to| {
            graph
                .get_node(to)
                .is_some_and(|t| t.connections.contains(&n.id))
        })
    })
}

/// Tick until an event matches. Returns elapsed simulated time.
fn time_until(
    agent: &mut TraversalAgent,
    graph: &mut WaypointGraph,
    dt: f32,
    max_steps: usize,
    pred: impl Fn(&NavEvent) -> bool,
) -> Option<f32> {
    (1..=max_steps).find_map(|step| {
        agent
            .tick(graph, dt)
            .iter()
            .any(&pred)
            .then_some(step as f32 * dt)
    })
}

// ── 1. Topology ─────────────────────────────────────────────────────────

fn validate_topology(verbose: bool) -> Vec<TestResult> {
    println!("--- Topology ---");
    let mut results = Vec::new();

    let square = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 10.0),
        Vec3::new(0.0, 0.0, 10.0),
    ];
    match (
        network(&square, TopologyMode::Loop),
        network(&square, TopologyMode::Linear),
    ) {
        (Some(g), Some(linear)) => {
            let degrees: Vec<usize> = g.all_nodes().map(|n| n.connections.len()).collect();
            let extends_linear = linear.all_nodes().all(|n| {
                n.connections
                    .iter()
                    .all(|&to| g.neighbors(n.id).any(|m| m == to))
            });
            results.push(TestResult {
                name: "loop_square_cycle".into(),
                passed: degrees == vec![2, 2, 2, 2] && extends_linear,
                detail: format!("degrees {:?}, contains linear chain: {}", degrees, extends_linear),
            });
        }
        _ => results.push(TestResult {
            name: "loop_square_cycle".into(),
            passed: false,
            detail: "network build failed".into(),
        }),
    }

    let positions = scatter(24);
    for mode in [
        TopologyMode::Auto,
        TopologyMode::Linear,
        TopologyMode::Loop,
        TopologyMode::Hub,
        TopologyMode::Grid,
        TopologyMode::NearestNeighbor,
    ] {
        let a = network(&positions, mode);
        let b = network(&positions, mode);
        let (symmetric, deterministic, edges) = match (&a, &b) {
            (Some(a), Some(b)) => (
                is_symmetric(a),
                a.all_nodes()
                    .zip(b.all_nodes())
                    .all(|(x, y)| x.connections == y.connections),
                a.edge_count(),
            ),
            _ => (false, false, 0),
        };
        results.push(TestResult {
            name: format!("return_paths_symmetric:{:?}", mode),
            passed: symmetric,
            detail: format!("{} directed edges", edges),
        });
        results.push(TestResult {
            name: format!("topology_deterministic:{:?}", mode),
            passed: deterministic,
            detail: "two builds, identical connection sets".into(),
        });
    }

    // Auto-detection on canonical layouts
    let line: Vec<Vec3> = (0..6).map(|i| Vec3::new(i as f32 * 8.0, 0.0, 0.0)).collect();
    for (name, layout, expected) in [
        ("auto_detects_linear", line, TopologyMode::Linear),
        ("auto_detects_grid", grid(4, 10.0), TopologyMode::Grid),
    ] {
        let report = build_network(&records_from_positions(&layout), &topology(TopologyMode::Auto));
        let mode = report.map(|(_, r)| r.mode).ok();
        results.push(TestResult {
            name: name.into(),
            passed: mode == Some(expected),
            detail: format!("{:?}", mode),
        });
    }

    let empty = build_network(&[], &TopologyConfig::default());
    results.push(TestResult {
        name: "empty_network_rejected".into(),
        passed: empty.is_err(),
        detail: "no records → ConfigurationError".into(),
    });

    if verbose {
        println!("  {} topology checks", results.len());
    }
    results
}

// ── 2. Pathfinding ──────────────────────────────────────────────────────

fn validate_pathfinding(verbose: bool) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();

    let Some(mut graph) = network(&scatter(30), TopologyMode::NearestNeighbor) else {
        results.push(TestResult {
            name: "pathfind_network".into(),
            passed: false,
            detail: "network build failed".into(),
        });
        return results;
    };

    // Admissibility: never shorter than the straight line
    let ids = graph.node_ids();
    let mut checked = 0;
    let mut violations = 0;
    for &a in &ids {
        for &b in ids.iter().step_by(5) {
            if let Ok(path) = calculate_path(&mut graph, a, b) {
                checked += 1;
                let straight = match (graph.position(a), graph.position(b)) {
                    (Some(pa), Some(pb)) => pa.distance(&pb),
                    _ => 0.0,
                };
                if path_length(&graph, &path.nodes) + 1e-3 < straight {
                    violations += 1;
                }
            }
        }
    }
    results.push(TestResult {
        name: "pathfind_admissible".into(),
        passed: checked > 0 && violations == 0,
        detail: format!("{} paths, {} shorter than straight line", checked, violations),
    });

    let same = calculate_path(&mut graph, 0, 0);
    results.push(TestResult {
        name: "pathfind_same_node".into(),
        passed: same.as_ref().is_ok_and(|p| p.nodes == vec![0]),
        detail: "0→0 = [0]".into(),
    });

    let unknown = calculate_path(&mut graph, 0, 9999);
    results.push(TestResult {
        name: "pathfind_unknown_node".into(),
        passed: unknown == Err(PathError::UnknownNode(9999)),
        detail: format!("{:?}", unknown.err()),
    });

    // Two islands wired by explicit connections only
    let records = vec![
        WaypointRecord::at(Vec3::new(0.0, 0.0, 0.0)).connected_to(&[1]),
        WaypointRecord::at(Vec3::new(5.0, 0.0, 0.0)),
        WaypointRecord::at(Vec3::new(40.0, 0.0, 0.0)).connected_to(&[3]),
        WaypointRecord::at(Vec3::new(45.0, 0.0, 0.0)),
    ];
    match build_network(&records, &topology(TopologyMode::Manual)) {
        Ok((mut islands, _)) => {
            let r = calculate_path(&mut islands, 0, 2);
            results.push(TestResult {
                name: "pathfind_unreachable".into(),
                passed: r == Err(PathError::NoPath { start: 0, target: 2 }),
                detail: "{0,1} and {2,3} → NoPath".into(),
            });
        }
        Err(e) => results.push(TestResult {
            name: "pathfind_unreachable".into(),
            passed: false,
            detail: format!("network build failed: {}", e),
        }),
    }

    if verbose {
        println!("  {} pathfinding checks", results.len());
    }
    results
}

// ── 3. Sequencing ───────────────────────────────────────────────────────

fn validate_sequencing(_verbose: bool) -> Vec<TestResult> {
    println!("--- Sequencing ---");
    let mut results = Vec::new();

    let mut failures = Vec::new();
    for count in 1..=40 {
        let Some(graph) = network(&scatter(count), TopologyMode::Auto) else {
            failures.push(count);
            continue;
        };
        let ids = graph.node_ids();
        let mut order = greedy_order(&graph, &ids, Vec3::new(25.0, 0.0, 12.0));
        order.sort_unstable();
        if order != ids {
            failures.push(count);
        }
    }
    results.push(TestResult {
        name: "greedy_visits_each_once".into(),
        passed: failures.is_empty(),
        detail: format!("node counts 1..=40, failures at {:?}", failures),
    });

    results
}

// ── 4. Traversal ────────────────────────────────────────────────────────

fn validate_traversal(verbose: bool) -> Vec<TestResult> {
    println!("--- Traversal ---");
    let mut results = Vec::new();

    let config = AgentConfig {
        move_speed: 5.0,
        visit_time: 0.5,
        restart_delay: 2.0,
        seed: Some(1),
        ..Default::default()
    };

    // Hop timing: A→B 10m, B→C 15m at 5 m/s
    let line = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(25.0, 0.0, 0.0),
    ];
    if let Some(mut g) = network(&line, TopologyMode::Linear) {
        let mut agent = TraversalAgent::new(Vec3::ZERO, config.clone());
        let started = agent.go_to(&mut g, 2).is_ok();
        let ab = time_until(&mut agent, &mut g, 0.25, 100, |e| {
            *e == NavEvent::WaypointReached { node: 1 }
        });
        let bc = time_until(&mut agent, &mut g, 0.25, 100, |e| {
            *e == NavEvent::ArrivedAtDestination { node: 2 }
        });
        let close = |t: Option<f32>, want: f32| t.is_some_and(|t| (t - want).abs() < 1e-3);
        results.push(TestResult {
            name: "hop_timing".into(),
            passed: started && close(ab, 2.0) && close(bc, 3.0),
            detail: format!("A→B {:?}s (want 2.0), B→C {:?}s (want 3.0)", ab, bc),
        });
    }

    // Unreachable stop is skipped, route continues
    let records = vec![
        WaypointRecord::at(Vec3::new(0.0, 0.0, 0.0)).connected_to(&[1]),
        WaypointRecord::at(Vec3::new(5.0, 0.0, 0.0)),
        WaypointRecord::at(Vec3::new(40.0, 0.0, 0.0)).connected_to(&[3]),
        WaypointRecord::at(Vec3::new(45.0, 0.0, 0.0)),
    ];
    if let Ok((mut g, _)) = build_network(&records, &topology(TopologyMode::Manual)) {
        let skip_config = AgentConfig {
            visit_mode: VisitMode::Custom,
            custom_route: vec![2, 1],
            ..config.clone()
        };
        let mut agent = TraversalAgent::new(Vec3::ZERO, skip_config);
        let _ = agent.start(&mut g);
        let mut events = Vec::new();
        for _ in 0..40 {
            events.extend(agent.tick(&mut g, 0.25));
        }
        let skipped = events.contains(&NavEvent::StopSkipped {
            node: 2,
            reason: SkipReason::NoPath,
        });
        let arrived = events.contains(&NavEvent::ArrivedAtDestination { node: 1 });
        results.push(TestResult {
            name: "unreachable_stop_skipped".into(),
            passed: skipped && arrived && agent.state() == AgentState::RouteComplete,
            detail: format!("skipped {}, reached next stop {}", skipped, arrived),
        });
    }

    // Looping route resets visits and restarts after the delay
    let three = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(5.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
    ];
    if let Some(mut g) = network(&three, TopologyMode::Linear) {
        let loop_config = AgentConfig {
            loop_route: true,
            ..config.clone()
        };
        let mut agent = TraversalAgent::new(Vec3::ZERO, loop_config);
        let _ = agent.start(&mut g);
        let completed = time_until(&mut agent, &mut g, 0.1, 300, |e| {
            *e == NavEvent::CompletedFullRoute
        });
        let reset = g.all_nodes().all(|n| !n.visited);
        let first_stop: Option<NodeId> = agent.route().first().copied();
        let rearrived = time_until(&mut agent, &mut g, 0.1, 300, |e| {
            matches!(e, NavEvent::ArrivedAtDestination { node } if Some(*node) == first_stop)
        });
        results.push(TestResult {
            name: "loop_restart".into(),
            passed: completed.is_some() && reset && rearrived.is_some_and(|t| t >= 2.0 - 1e-3),
            detail: format!(
                "completed at {:?}s, visits reset {}, first stop again after {:?}s",
                completed, reset, rearrived
            ),
        });
    }

    if verbose {
        println!("  {} traversal checks", results.len());
    }
    results
}

// ── 5. Engine ───────────────────────────────────────────────────────────

fn validate_engine(_verbose: bool) -> Vec<TestResult> {
    println!("--- Engine ---");
    let mut results = Vec::new();

    let mut engine = NavigationEngine::default();
    let configured = engine
        .configure_network(records_from_positions(&grid(3, 10.0)))
        .is_ok();
    let a = engine.spawn_agent("alpha", Vec3::ZERO);
    let b = engine.spawn_agent("beta", Vec3::new(20.0, 0.0, 20.0));
    let started = engine.start_all();
    for _ in 0..600 {
        engine.update(0.1);
    }
    let events = engine.drain_events();
    let all_visited = events
        .iter()
        .filter(|e| e.event == NavEvent::AllNodesVisited)
        .count();
    let done = [a, b].iter().all(|&e| {
        engine
            .agent_progress(e)
            .is_ok_and(|p| p.state == AgentState::RouteComplete)
    });
    results.push(TestResult {
        name: "engine_two_agents".into(),
        passed: configured && started == 2 && done && all_visited == 1,
        detail: format!(
            "started {}, both complete {}, all-visited events {}",
            started, done, all_visited
        ),
    });

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    let mut loaded = NavigationEngine::default();
    let restored = saved.is_ok() && loaded.load(&buffer[..]).is_ok();
    let same_graph = loaded.graph.edge_count() == engine.graph.edge_count()
        && loaded.graph.node_count() == engine.graph.node_count();
    results.push(TestResult {
        name: "engine_save_load".into(),
        passed: restored && same_graph && loaded.agent_count() == 2,
        detail: format!("{} bytes, {} agents restored", buffer.len(), loaded.agent_count()),
    });

    results
}

// ── 6. Scenario replay ──────────────────────────────────────────────────

fn replay_json(source: &str, json: &str, verbose: bool) -> Vec<TestResult> {
    match serde_json::from_str::<Scenario>(json) {
        Ok(scenario) => replay(&scenario, verbose),
        Err(e) => vec![TestResult {
            name: format!("scenario_parse:{}", source),
            passed: false,
            detail: format!("JSON parse error: {}", e),
        }],
    }
}

fn replay(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let name = |check: &str| format!("{}:{}", scenario.name, check);

    log::info!(
        "Replaying scenario '{}' ({} waypoints, {} agents, {:.0}s)",
        scenario.name,
        scenario.waypoints.len(),
        scenario.agents.len(),
        scenario.duration
    );

    let config_errors = validate_config(&scenario.config);
    for e in &config_errors {
        log::warn!("[{}] {}", scenario.name, e);
    }
    results.push(TestResult {
        name: name("config_valid"),
        passed: config_errors.is_empty(),
        detail: config_errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    });

    let mut engine = NavigationEngine::new(scenario.config.clone());
    let report = match engine.configure_network(scenario.waypoints.clone()) {
        Ok(r) => r,
        Err(e) => {
            results.push(TestResult {
                name: name("network"),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    if let Some(mode) = scenario.expect.mode {
        results.push(TestResult {
            name: name("mode"),
            passed: report.mode == mode,
            detail: format!("expected {:?}, built {:?}", mode, report.mode),
        });
    }

    for agent in &scenario.agents {
        match &agent.config {
            Some(config) => engine.spawn_agent_with(&agent.name, agent.position, config.clone()),
            None => engine.spawn_agent(&agent.name, agent.position),
        };
    }
    engine.start_all();

    let step = scenario.time_step.max(1e-3);
    let steps = (scenario.duration / step).ceil() as usize;
    let mut arrivals = 0;
    let mut deliveries = 0;
    let mut skipped = 0;
    let mut routes = 0;
    let mut all_visited = false;
    for _ in 0..steps {
        engine.update(step);
        for e in engine.drain_events() {
            match e.event {
                NavEvent::ArrivedAtDestination { .. } => arrivals += 1,
                NavEvent::CompletedDelivery { .. } => deliveries += 1,
                NavEvent::StopSkipped { .. } => skipped += 1,
                NavEvent::CompletedFullRoute => routes += 1,
                NavEvent::AllNodesVisited => all_visited = true,
                _ => {}
            }
        }
    }

    if verbose {
        println!(
            "  {}: {:?}, {} nodes, {} agents, {:.0}s → {} arrivals, {} deliveries, {} skipped, {} routes",
            scenario.name,
            report.mode,
            report.node_count,
            scenario.agents.len(),
            scenario.duration,
            arrivals,
            deliveries,
            skipped,
            routes
        );
    }

    let expect = &scenario.expect;
    for (check, want, got) in [
        ("arrivals", expect.arrivals, arrivals),
        ("deliveries", expect.deliveries, deliveries),
        ("skipped", expect.skipped, skipped),
    ] {
        if let Some(want) = want {
            results.push(TestResult {
                name: name(check),
                passed: got == want,
                detail: format!("expected {}, got {}", want, got),
            });
        }
    }
    if let Some(min) = expect.min_routes_completed {
        results.push(TestResult {
            name: name("routes_completed"),
            passed: routes >= min,
            detail: format!("expected at least {}, got {}", min, routes),
        });
    }
    if let Some(want) = expect.all_nodes_visited {
        results.push(TestResult {
            name: name("all_nodes_visited"),
            passed: all_visited == want,
            detail: format!("expected {}, got {}", want, all_visited),
        });
    }

    results
}
