//! Reference engine world that ties everything together
//!
//! A small deterministic car-following simulator implementing the
//! [`SimulationEngine`] contract, so the controller can run without the
//! native simulator.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use super::intersection::SimIntersection;
use super::road_network::SimRoadNetwork;
use super::types::{LaneIndex, RoadIndex, SimId, VehicleId, WAITING_SPEED_THRESHOLD};
use super::vehicle::{SimVehicle, VehicleUpdate};
use crate::engine::{LaneCounts, SimulationEngine};
use crate::roadnet::{load_flows, EngineConfigFile, FlowSpec, RoadnetFile, VehicleSpec};

/// Engine-wide settings taken from the engine config file
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Seconds per tick
    pub interval: f32,
    pub seed: u64,
    /// When false the intersections run their fixed-time programs
    pub rl_traffic_light: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            interval: 1.0,
            seed: 0,
            rl_traffic_light: true,
        }
    }
}

/// A vehicle source following one route
#[derive(Debug, Clone)]
struct SimFlow {
    vehicle: VehicleSpec,
    route: Vec<RoadIndex>,
    interval: f32,
    start_time: f32,
    end_time: Option<f32>,
    next_spawn: f32,
    /// Vehicles waiting for room on the first road
    pending: VecDeque<VehicleId>,
}

impl SimFlow {
    fn reset(&mut self) {
        self.next_spawn = self.start_time;
        self.pending.clear();
    }
}

/// The main simulation world
pub struct SimWorld {
    /// Roads, lanes and lane occupancy
    pub road_network: SimRoadNetwork,

    /// All intersections, virtual ones included
    pub intersections: HashMap<String, SimIntersection>,

    /// Vehicles currently on a lane
    pub vehicles: HashMap<VehicleId, SimVehicle>,

    flows: Vec<SimFlow>,

    settings: EngineSettings,

    /// Next ID to assign
    next_id: usize,

    /// Ticks run since the last reset
    tick: u64,

    /// Vehicles that completed their route since the last reset
    finished_vehicles: usize,

    rng: StdRng,
}

impl SimWorld {
    pub fn new(
        roadnet: &RoadnetFile,
        flows: &[FlowSpec],
        settings: EngineSettings,
    ) -> Result<Self> {
        if settings.interval <= 0.0 {
            bail!("Engine interval must be positive, got {}", settings.interval);
        }

        let mut road_network = SimRoadNetwork::from_roadnet(roadnet)?;

        let mut intersections = HashMap::with_capacity(roadnet.intersections.len());
        for spec in &roadnet.intersections {
            let intersection = SimIntersection::from_spec(spec, &road_network)?;
            intersections.insert(spec.id.clone(), intersection);
        }

        let mut sim_flows = Vec::with_capacity(flows.len());
        for (index, flow) in flows.iter().enumerate() {
            if flow.interval <= 0.0 {
                bail!("Flow {} has non-positive interval {}", index, flow.interval);
            }
            if flow.route.is_empty() {
                bail!("Flow {} has an empty route", index);
            }
            let route = road_network
                .complete_route(&flow.route)
                .with_context(|| format!("Failed to resolve route of flow {}", index))?;
            sim_flows.push(SimFlow {
                vehicle: flow.vehicle,
                route,
                interval: flow.interval,
                start_time: flow.start_time as f32,
                end_time: (flow.end_time >= 0).then_some(flow.end_time as f32),
                next_spawn: flow.start_time as f32,
                pending: VecDeque::new(),
            });
        }

        debug!(
            "Reference engine built: {} intersections, {} roads, {} lanes, {} flows",
            intersections.len(),
            road_network.road_count(),
            road_network.lane_count(),
            sim_flows.len()
        );

        Ok(Self {
            road_network,
            intersections,
            vehicles: HashMap::new(),
            flows: sim_flows,
            settings,
            next_id: 0,
            tick: 0,
            finished_vehicles: 0,
            rng: StdRng::seed_from_u64(settings.seed),
        })
    }

    /// Build the engine described by an engine config file, along with the
    /// road network it simulates
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<(Self, RoadnetFile)> {
        let path = path.as_ref();
        let config = EngineConfigFile::load(path)?;
        let roadnet = RoadnetFile::load(config.roadnet_path(path))?;
        let flows = load_flows(config.flow_path(path))?;
        let world = Self::new(
            &roadnet,
            &flows,
            EngineSettings {
                interval: config.interval,
                seed: config.seed,
                rl_traffic_light: config.rl_traffic_light,
            },
        )
        .with_context(|| format!("Failed to build engine from {}", path.display()))?;
        Ok((world, roadnet))
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Simulated seconds since the last reset
    pub fn time(&self) -> f32 {
        self.tick as f32 * self.settings.interval
    }

    pub fn active_vehicles(&self) -> usize {
        self.vehicles.len()
    }

    pub fn pending_vehicles(&self) -> usize {
        self.flows.iter().map(|flow| flow.pending.len()).sum()
    }

    pub fn finished_vehicles(&self) -> usize {
        self.finished_vehicles
    }

    pub fn current_phase(&self, intersection: &str) -> Option<usize> {
        self.intersections
            .get(intersection)
            .map(|intersection| intersection.current_phase)
    }

    pub fn summary(&self) -> String {
        format!(
            "t={:.0}s | active vehicles: {} | waiting to enter: {} | finished: {}",
            self.time(),
            self.active_vehicles(),
            self.pending_vehicles(),
            self.finished_vehicles
        )
    }

    fn next_vehicle_id(&mut self) -> VehicleId {
        let id = VehicleId(SimId(self.next_id));
        self.next_id += 1;
        id
    }

    /// Queue the vehicles every flow is due to emit at `now`
    fn spawn_due_vehicles(&mut self, now: f32) {
        for index in 0..self.flows.len() {
            loop {
                let flow = &self.flows[index];
                let expired = flow.end_time.is_some_and(|end| flow.next_spawn > end);
                if expired || flow.next_spawn > now {
                    break;
                }
                let id = self.next_vehicle_id();
                let flow = &mut self.flows[index];
                flow.pending.push_back(id);
                flow.next_spawn += flow.interval;
            }
        }
    }

    /// Lane of the flow's first road the next vehicle should enter on
    fn entry_lane(&mut self, flow_index: usize) -> Option<LaneIndex> {
        let flow = &self.flows[flow_index];
        let first_road = *flow.route.first()?;
        let gap = flow.vehicle.length + flow.vehicle.min_gap;
        let road = self.road_network.road(first_road);

        let feeding: Vec<LaneIndex> = match flow.route.get(1) {
            Some(&next_road) => {
                let link = self
                    .intersections
                    .get(&road.end_intersection)
                    .and_then(|intersection| {
                        intersection
                            .find_link(first_road, next_road)
                            .map(|link| intersection.entry_lanes(link))
                    })
                    .unwrap_or_default();
                link.iter()
                    .filter_map(|index| road.lanes.get(*index).copied())
                    .collect()
            }
            None => road.lanes.clone(),
        };
        let candidates: Vec<LaneIndex> = if feeding.is_empty() {
            road.lanes.clone()
        } else {
            feeding
        };

        let open: Vec<LaneIndex> = candidates
            .into_iter()
            .filter(|lane| self.road_network.can_enter(*lane, gap))
            .collect();
        let least = open
            .iter()
            .map(|lane| self.road_network.occupancy(*lane))
            .min()?;
        let emptiest: Vec<LaneIndex> = open
            .into_iter()
            .filter(|lane| self.road_network.occupancy(*lane) == least)
            .collect();
        emptiest.choose(&mut self.rng).copied()
    }

    /// Move queued vehicles onto their first road where there is room
    fn insert_pending(&mut self) -> Result<()> {
        for index in 0..self.flows.len() {
            while let Some(&id) = self.flows[index].pending.front() {
                let Some(lane) = self.entry_lane(index) else {
                    break;
                };
                let flow = &mut self.flows[index];
                flow.pending.pop_front();
                let vehicle = SimVehicle::new(
                    id,
                    flow.route.clone(),
                    lane,
                    flow.vehicle.max_speed,
                    flow.vehicle.length + flow.vehicle.min_gap,
                );
                self.road_network
                    .place_vehicle(lane, vehicle.distance_along_lane, id)?;
                self.vehicles.insert(id, vehicle);
            }
        }
        Ok(())
    }

    fn update_vehicles(&mut self) -> Result<()> {
        let tick = self.tick;
        let delta_secs = self.settings.interval;
        for lane in 0..self.road_network.lane_count() {
            for id in self.road_network.vehicles_front_to_back(LaneIndex(lane)) {
                let Some(vehicle) = self.vehicles.get_mut(&id) else {
                    continue;
                };
                // Vehicles that crossed into this lane earlier in the tick already moved
                if vehicle.last_tick == tick {
                    continue;
                }
                let result = vehicle.update(
                    tick,
                    delta_secs,
                    &mut self.road_network,
                    &self.intersections,
                )?;
                if result == VehicleUpdate::LeftNetwork {
                    self.vehicles.remove(&id);
                    self.finished_vehicles += 1;
                }
            }
        }
        Ok(())
    }

    fn count_lanes(&self, waiting_only: bool) -> LaneCounts {
        let mut counts: LaneCounts = self
            .road_network
            .lanes()
            .iter()
            .map(|lane| (lane.id.clone(), 0))
            .collect();
        for vehicle in self.vehicles.values() {
            if waiting_only && vehicle.speed >= WAITING_SPEED_THRESHOLD {
                continue;
            }
            let lane = &self.road_network.lane(vehicle.lane).id;
            if let Some(count) = counts.get_mut(lane) {
                *count += 1;
            }
        }
        counts
    }
}

impl SimulationEngine for SimWorld {
    fn reset(&mut self) -> Result<()> {
        self.vehicles.clear();
        self.road_network.clear_vehicles();
        for flow in &mut self.flows {
            flow.reset();
        }
        for intersection in self.intersections.values_mut() {
            intersection.reset();
        }
        self.next_id = 0;
        self.tick = 0;
        self.finished_vehicles = 0;
        self.rng = StdRng::seed_from_u64(self.settings.seed);
        Ok(())
    }

    fn next_step(&mut self) -> Result<()> {
        let now = self.time();
        self.tick += 1;
        self.spawn_due_vehicles(now);
        self.insert_pending()?;
        self.update_vehicles()?;
        if !self.settings.rl_traffic_light {
            let delta_secs = self.settings.interval;
            for intersection in self.intersections.values_mut() {
                intersection.update_timer(delta_secs);
            }
        }
        Ok(())
    }

    fn set_traffic_light_phase(&mut self, intersection: &str, phase: usize) -> Result<()> {
        self.intersections
            .get_mut(intersection)
            .with_context(|| format!("Intersection {} not found", intersection))?
            .set_phase(phase)
    }

    fn lane_vehicle_count(&self) -> Result<LaneCounts> {
        Ok(self.count_lanes(false))
    }

    fn lane_waiting_vehicle_count(&self) -> Result<LaneCounts> {
        Ok(self.count_lanes(true))
    }

    fn set_random_seed(&mut self, seed: u64) -> Result<()> {
        self.settings.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        info!("Releasing reference engine: {}", self.summary());
        self.vehicles = HashMap::new();
        self.road_network.clear_vehicles();
        for flow in &mut self.flows {
            flow.pending = VecDeque::new();
        }
        Ok(())
    }
}
