//! Environment configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Feature groups that make up an intersection's observation
///
/// Features are always emitted in declaration order, whatever order the
/// configuration lists them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationChannel {
    /// One-hot encoding of the current green phase
    #[serde(rename = "phase")]
    Phase,
    /// Vehicles on each incoming lane
    #[serde(rename = "lane_vehicle_num", alias = "lane_vehicle_count")]
    LaneVehicleCount,
    /// Waiting vehicles on each incoming lane
    #[serde(
        rename = "lane_waiting_vehicle_num",
        alias = "lane_waiting_vehicle_count"
    )]
    LaneWaitingVehicleCount,
}

impl ObservationChannel {
    pub const ALL: [ObservationChannel; 3] = [
        ObservationChannel::Phase,
        ObservationChannel::LaneVehicleCount,
        ObservationChannel::LaneWaitingVehicleCount,
    ];
}

/// How agents express actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionEncoding {
    /// One green-phase index per intersection
    #[default]
    PerIntersection,
    /// A single integer encoding all intersections' phase indices
    FlatDiscrete,
}

/// Tick lengths of the three transition stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Durations {
    pub red: u64,
    pub yellow: u64,
    pub green: u64,
}

impl Durations {
    pub fn new(red: u64, yellow: u64, green: u64) -> Self {
        Self { red, yellow, green }
    }

    /// Ticks consumed by every step
    pub fn step_ticks(&self) -> u64 {
        self.red + self.yellow + self.green
    }
}

/// Configuration of a signal control environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Engine config file; relative paths resolve against the env config file
    pub config_path: Option<PathBuf>,
    pub obs_type: Vec<ObservationChannel>,
    /// Tick budget of an episode
    pub max_episode_duration: u64,
    pub green_duration: u64,
    pub yellow_duration: u64,
    pub red_duration: u64,
    pub action_encoding: ActionEncoding,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            obs_type: ObservationChannel::ALL.to_vec(),
            max_episode_duration: 1000,
            green_duration: 30,
            yellow_duration: 5,
            red_duration: 0,
            action_encoding: ActionEncoding::PerIntersection,
        }
    }
}

impl EnvConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read env config {}", path.display()))?;
        let mut config: EnvConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse env config {}", path.display()))?;

        if let (Some(engine_config), Some(parent)) = (&config.config_path, path.parent()) {
            if engine_config.is_relative() {
                config.config_path = Some(parent.join(engine_config));
            }
        }
        Ok(config)
    }

    pub fn durations(&self) -> Durations {
        Durations::new(self.red_duration, self.yellow_duration, self.green_duration)
    }

    pub fn has_channel(&self, channel: ObservationChannel) -> bool {
        self.obs_type.contains(&channel)
    }
}
