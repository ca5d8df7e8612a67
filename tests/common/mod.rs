//! Shared fixtures for the integration tests

#![allow(dead_code)]

use anyhow::{bail, Result};
use signal_control::control::{EnvConfig, SignalEnv};
use signal_control::engine::{LaneCounts, SimulationEngine};
use signal_control::roadnet::{GridOptions, RoadnetFile};

/// Engine double that records every call and serves scripted lane counts
#[derive(Debug, Default)]
pub struct RecordingEngine {
    /// (intersection, phase, ticks run before the command)
    pub commands: Vec<(String, usize, u64)>,
    pub ticks: u64,
    pub resets: u32,
    pub releases: u32,
    pub seed: Option<u64>,
    pub vehicles: LaneCounts,
    pub waiting: LaneCounts,
    /// Name of the engine call that should fail
    pub fail_on: Option<&'static str>,
}

impl RecordingEngine {
    pub fn new(roadnet: &RoadnetFile) -> Self {
        let lanes: LaneCounts = roadnet.lane_ids().into_iter().map(|lane| (lane, 0)).collect();
        Self {
            vehicles: lanes.clone(),
            waiting: lanes,
            ..Self::default()
        }
    }

    pub fn set_vehicles(&mut self, lane: &str, count: u32) {
        self.vehicles.insert(lane.to_string(), count);
    }

    pub fn set_waiting(&mut self, lane: &str, count: u32) {
        self.waiting.insert(lane.to_string(), count);
    }

    /// Stop reporting a lane, as an engine with a different network would
    pub fn drop_lane(&mut self, lane: &str) {
        self.vehicles.remove(lane);
        self.waiting.remove(lane);
    }

    /// Commands issued to one intersection as (phase, tick) pairs
    pub fn commands_for(&self, intersection: &str) -> Vec<(usize, u64)> {
        self.commands
            .iter()
            .filter(|(id, _, _)| id == intersection)
            .map(|(_, phase, tick)| (*phase, *tick))
            .collect()
    }

    fn check(&self, call: &'static str) -> Result<()> {
        if self.fail_on == Some(call) {
            bail!("engine connection lost during {}", call);
        }
        Ok(())
    }
}

impl SimulationEngine for RecordingEngine {
    fn reset(&mut self) -> Result<()> {
        self.check("reset")?;
        self.resets += 1;
        self.ticks = 0;
        Ok(())
    }

    fn next_step(&mut self) -> Result<()> {
        self.check("next_step")?;
        self.ticks += 1;
        Ok(())
    }

    fn set_traffic_light_phase(&mut self, intersection: &str, phase: usize) -> Result<()> {
        self.check("set_traffic_light_phase")?;
        self.commands
            .push((intersection.to_string(), phase, self.ticks));
        Ok(())
    }

    fn lane_vehicle_count(&self) -> Result<LaneCounts> {
        self.check("lane_vehicle_count")?;
        Ok(self.vehicles.clone())
    }

    fn lane_waiting_vehicle_count(&self) -> Result<LaneCounts> {
        self.check("lane_waiting_vehicle_count")?;
        Ok(self.waiting.clone())
    }

    fn set_random_seed(&mut self, seed: u64) -> Result<()> {
        self.check("set_random_seed")?;
        self.seed = Some(seed);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.check("release")?;
        self.releases += 1;
        Ok(())
    }
}

/// A `rows x cols` grid with its default signal program
pub fn grid(rows: usize, cols: usize) -> RoadnetFile {
    RoadnetFile::grid(rows, cols, &GridOptions::default())
}

pub fn config(red: u64, yellow: u64, green: u64, max_episode_duration: u64) -> EnvConfig {
    EnvConfig {
        red_duration: red,
        yellow_duration: yellow,
        green_duration: green,
        max_episode_duration,
        ..EnvConfig::default()
    }
}

/// Environment over a recording engine on a grid, actions enabled
pub fn recording_env(
    rows: usize,
    cols: usize,
    config: EnvConfig,
) -> SignalEnv<RecordingEngine> {
    let roadnet = grid(rows, cols);
    let engine = RecordingEngine::new(&roadnet);
    SignalEnv::new(engine, &roadnet, true, config).expect("env should build")
}
