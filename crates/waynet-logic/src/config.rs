//! Externally settable navigation configuration.
//!
//! Everything deserializes with `#[serde(default)]`, so a JSON file only
//! needs the fields it wants to change:
//!
//! ```
//! use waynet_logic::config::{validate_config, NavConfig};
//! use waynet_logic::topology::TopologyMode;
//!
//! let mut config = NavConfig::default();
//! config.network.mode = TopologyMode::Loop;
//! config.agent.move_speed = 3.5;
//! assert!(validate_config(&config).is_empty());
//! ```

use crate::graph::NodeId;
use crate::sequencer::{TraverseMode, VisitMode};
use crate::topology::TopologyConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-agent traversal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub visit_mode: VisitMode,
    pub traverse_mode: TraverseMode,
    /// Stop list for `VisitMode::Custom`.
    pub custom_route: Vec<NodeId>,
    pub loop_route: bool,
    /// Metres per second.
    pub move_speed: f32,
    /// Dwell at ordinary stops (s).
    pub visit_time: f32,
    /// Dwell at delivery points (s).
    pub delivery_time: f32,
    /// Pause between a completed route and the next loop (s).
    pub restart_delay: f32,
    /// Fraction of each hop spent turning toward the travel direction.
    pub rotation_fraction: f32,
    /// Seed for random ordering. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            visit_mode: VisitMode::All,
            traverse_mode: TraverseMode::Sequential,
            custom_route: Vec::new(),
            loop_route: false,
            move_speed: 5.0,
            visit_time: 1.0,
            delivery_time: 2.0,
            restart_delay: 2.0,
            rotation_fraction: 0.25,
            seed: None,
        }
    }
}

/// Network plus agent configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub network: TopologyConfig,
    pub agent: AgentConfig,
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Max connection distance must be positive.
    NonPositiveConnectionDistance(f32),
    /// Nearest-neighbour mode needs at least one neighbour.
    ZeroNeighborCount,
    /// An auto-detect ratio is outside (0, 1].
    RatioOutOfRange { field: &'static str, value: f32 },
    /// Alignment tolerance cannot be negative.
    NegativeTolerance(f32),
    /// Move speed must be positive.
    NonPositiveSpeed(f32),
    /// A dwell or delay is negative.
    NegativeDuration { field: &'static str, value: f32 },
    /// Rotation fraction is outside (0, 1].
    RotationFractionOutOfRange(f32),
    /// Custom visit mode with no stops.
    EmptyCustomRoute,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositiveConnectionDistance(v) => {
                write!(f, "max_connection_distance must be positive, got {}", v)
            }
            ConfigError::ZeroNeighborCount => write!(f, "nearest_neighbor_count must be at least 1"),
            ConfigError::RatioOutOfRange { field, value } => {
                write!(f, "{} must be in (0, 1], got {}", field, value)
            }
            ConfigError::NegativeTolerance(v) => {
                write!(f, "alignment_tolerance cannot be negative, got {}", v)
            }
            ConfigError::NonPositiveSpeed(v) => write!(f, "move_speed must be positive, got {}", v),
            ConfigError::NegativeDuration { field, value } => {
                write!(f, "{} cannot be negative, got {}", field, value)
            }
            ConfigError::RotationFractionOutOfRange(v) => {
                write!(f, "rotation_fraction must be in (0, 1], got {}", v)
            }
            ConfigError::EmptyCustomRoute => write!(f, "custom visit mode needs a custom_route"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn in_unit_range(v: f32) -> bool {
    v > 0.0 && v <= 1.0
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &NavConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let net = &config.network;
    let agent = &config.agent;

    if !(net.max_connection_distance > 0.0) {
        errors.push(ConfigError::NonPositiveConnectionDistance(
            net.max_connection_distance,
        ));
    }
    if net.nearest_neighbor_count == 0 {
        errors.push(ConfigError::ZeroNeighborCount);
    }
    for (field, value) in [
        ("linear_extent_ratio", net.auto_detect.linear_extent_ratio),
        ("grid_coverage", net.auto_detect.grid_coverage),
        ("comparable_extent_ratio", net.auto_detect.comparable_extent_ratio),
    ] {
        if !in_unit_range(value) {
            errors.push(ConfigError::RatioOutOfRange { field, value });
        }
    }
    if net.auto_detect.alignment_tolerance < 0.0 {
        errors.push(ConfigError::NegativeTolerance(
            net.auto_detect.alignment_tolerance,
        ));
    }

    if !(agent.move_speed > 0.0) {
        errors.push(ConfigError::NonPositiveSpeed(agent.move_speed));
    }
    for (field, value) in [
        ("visit_time", agent.visit_time),
        ("delivery_time", agent.delivery_time),
        ("restart_delay", agent.restart_delay),
    ] {
        if value < 0.0 || value.is_nan() {
            errors.push(ConfigError::NegativeDuration { field, value });
        }
    }
    if !in_unit_range(agent.rotation_fraction) {
        errors.push(ConfigError::RotationFractionOutOfRange(
            agent.rotation_fraction,
        ));
    }
    if agent.visit_mode == VisitMode::Custom && agent.custom_route.is_empty() {
        errors.push(ConfigError::EmptyCustomRoute);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(validate_config(&NavConfig::default()).is_empty());
    }

    #[test]
    fn test_defaults() {
        let c = NavConfig::default();
        assert!(c.network.create_return_paths);
        assert_eq!(c.network.nearest_neighbor_count, 3);
        assert!(!c.agent.loop_route);
        assert_eq!(c.agent.move_speed, 5.0);
    }

    #[test]
    fn test_reports_all_errors() {
        let mut c = NavConfig::default();
        c.network.max_connection_distance = 0.0;
        c.network.auto_detect.grid_coverage = 1.5;
        c.agent.move_speed = -1.0;
        c.agent.delivery_time = -2.0;
        c.agent.rotation_fraction = 0.0;
        c.agent.visit_mode = VisitMode::Custom;
        let errors = validate_config(&c);
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ConfigError::NonPositiveConnectionDistance(0.0)));
        assert!(errors.contains(&ConfigError::RatioOutOfRange {
            field: "grid_coverage",
            value: 1.5
        }));
        assert!(errors.contains(&ConfigError::NonPositiveSpeed(-1.0)));
        assert!(errors.contains(&ConfigError::NegativeDuration {
            field: "delivery_time",
            value: -2.0
        }));
        assert!(errors.contains(&ConfigError::EmptyCustomRoute));
    }

    #[test]
    fn test_nan_speed_rejected() {
        let mut c = NavConfig::default();
        c.agent.move_speed = f32::NAN;
        assert_eq!(validate_config(&c).len(), 1);
    }

    #[test]
    fn test_zero_durations_allowed() {
        let mut c = NavConfig::default();
        c.agent.visit_time = 0.0;
        c.agent.delivery_time = 0.0;
        c.agent.restart_delay = 0.0;
        assert!(validate_config(&c).is_empty());
    }
}
