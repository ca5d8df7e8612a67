//! Road network, flow and engine configuration files
//!
//! These mirror the JSON documents consumed by the microscopic simulator.
//! Unknown fields are ignored so real-world files parse without edits.

mod grid;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use grid::{grid_flows, GridOptions};

/// Default length of a vehicle in metres
pub const CAR_LENGTH: f32 = 5.0;

/// Default gap kept to the vehicle ahead in metres
pub const MIN_GAP: f32 = 2.5;

/// Default vehicle speed limit in metres per second
pub const DEFAULT_MAX_SPEED: f32 = 11.111;

/// Top level engine configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfigFile {
    /// Seconds of simulated time per tick
    #[serde(default = "default_interval")]
    pub interval: f32,
    #[serde(default)]
    pub seed: u64,
    /// Directory that `roadnet_file` and `flow_file` are relative to
    #[serde(default)]
    pub dir: String,
    pub roadnet_file: String,
    pub flow_file: String,
    /// When false the engine runs its own fixed-time signal programs
    #[serde(default = "default_true")]
    pub rl_traffic_light: bool,
}

fn default_interval() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl EngineConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    /// Resolve `dir` against the config file's own directory when it is relative
    pub fn base_dir(&self, config_path: &Path) -> PathBuf {
        let dir = Path::new(&self.dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            config_path
                .parent()
                .map(|parent| parent.join(dir))
                .unwrap_or_else(|| dir.to_path_buf())
        }
    }

    pub fn roadnet_path(&self, config_path: &Path) -> PathBuf {
        self.base_dir(config_path).join(&self.roadnet_file)
    }

    pub fn flow_path(&self, config_path: &Path) -> PathBuf {
        self.base_dir(config_path).join(&self.flow_file)
    }
}

/// A 2D point in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The road network document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoadnetFile {
    pub intersections: Vec<IntersectionSpec>,
    pub roads: Vec<RoadSpec>,
}

impl RoadnetFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn road(&self, id: &str) -> Option<&RoadSpec> {
        self.roads.iter().find(|road| road.id == id)
    }

    pub fn intersection(&self, id: &str) -> Option<&IntersectionSpec> {
        self.intersections.iter().find(|item| item.id == id)
    }

    /// Lane ids in the engine's `<road>_<index>` convention, road by road
    pub fn lane_ids(&self) -> Vec<String> {
        self.roads
            .iter()
            .flat_map(|road| (0..road.lanes.len()).map(move |index| lane_id(&road.id, index)))
            .collect()
    }
}

/// Builds the engine's lane identifier for a road lane
pub fn lane_id(road: &str, index: usize) -> String {
    format!("{}_{}", road, index)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionSpec {
    pub id: String,
    #[serde(default)]
    pub point: Point,
    /// Boundary nodes without a signal
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub roads: Vec<String>,
    #[serde(default)]
    pub road_links: Vec<RoadLinkSpec>,
    #[serde(default)]
    pub traffic_light: Option<TrafficLightSpec>,
}

impl IntersectionSpec {
    pub fn light_phases(&self) -> &[LightPhaseSpec] {
        self.traffic_light
            .as_ref()
            .map(|light| light.lightphases.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadLinkSpec {
    pub start_road: String,
    pub end_road: String,
    #[serde(default)]
    pub lane_links: Vec<LaneLinkSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneLinkSpec {
    pub start_lane_index: usize,
    pub end_lane_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLightSpec {
    #[serde(default)]
    pub lightphases: Vec<LightPhaseSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightPhaseSpec {
    /// Seconds the phase lasts under the engine's own fixed-time program
    #[serde(default)]
    pub time: f32,
    /// Indices into the intersection's `road_links`
    #[serde(default)]
    pub available_road_links: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadSpec {
    pub id: String,
    pub start_intersection: String,
    pub end_intersection: String,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub lanes: Vec<LaneSpec>,
}

impl RoadSpec {
    /// Polyline length of the road
    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneSpec {
    #[serde(default = "default_lane_width")]
    pub width: f32,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
}

impl Default for LaneSpec {
    fn default() -> Self {
        Self {
            width: default_lane_width(),
            max_speed: default_max_speed(),
        }
    }
}

fn default_lane_width() -> f32 {
    3.2
}

fn default_max_speed() -> f32 {
    DEFAULT_MAX_SPEED
}

/// One entry of the flow file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSpec {
    #[serde(default)]
    pub vehicle: VehicleSpec,
    pub route: Vec<String>,
    /// Seconds between two spawned vehicles
    pub interval: f32,
    #[serde(default)]
    pub start_time: u64,
    /// Last spawn time in seconds, negative for no limit
    #[serde(default = "default_end_time")]
    pub end_time: i64,
}

fn default_end_time() -> i64 {
    -1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSpec {
    #[serde(default = "default_car_length")]
    pub length: f32,
    #[serde(default = "default_min_gap")]
    pub min_gap: f32,
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
}

impl Default for VehicleSpec {
    fn default() -> Self {
        Self {
            length: CAR_LENGTH,
            min_gap: MIN_GAP,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

fn default_car_length() -> f32 {
    CAR_LENGTH
}

fn default_min_gap() -> f32 {
    MIN_GAP
}

pub fn load_flows(path: impl AsRef<Path>) -> Result<Vec<FlowSpec>> {
    read_json(path.as_ref())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
