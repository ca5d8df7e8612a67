//! Observation and reward aggregation
//!
//! Per-lane engine snapshots are folded into fixed-size per-intersection
//! feature vectors and per-intersection rewards.

use std::collections::BTreeSet;

use super::config::ObservationChannel;
use super::error::{EngineResultExt, EnvError, EnvResult};
use super::topology::Topology;
use super::types::{Direction, IntersectionId};
use crate::engine::{LaneCounts, SimulationEngine};

/// Feature vectors per intersection, in topology order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    entries: Vec<(IntersectionId, Vec<f32>)>,
}

impl Observation {
    pub fn get(&self, intersection: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|(id, _)| id.as_str() == intersection)
            .map(|(_, features)| features.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IntersectionId, &[f32])> {
        self.entries
            .iter()
            .map(|(id, features)| (id, features.as_slice()))
    }

    /// Total number of features
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, features)| features.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate the intersections in topology order
    pub fn flatten(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.len());
        for (_, features) in &self.entries {
            flat.extend_from_slice(features);
        }
        flat
    }
}

/// Reward per intersection, in topology order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntersectionRewards {
    entries: Vec<(IntersectionId, f32)>,
}

impl IntersectionRewards {
    pub fn get(&self, intersection: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(id, _)| id.as_str() == intersection)
            .map(|(_, reward)| *reward)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IntersectionId, f32)> {
        self.entries.iter().map(|(id, reward)| (id, *reward))
    }

    pub fn total(&self) -> f32 {
        self.entries.iter().map(|(_, reward)| reward).sum()
    }
}

/// Builds observations and rewards with a layout fixed at construction
#[derive(Debug, Clone)]
pub struct TelemetryAggregator {
    channels: BTreeSet<Channel>,
    /// Expected feature count per intersection
    layout: Vec<usize>,
}

/// Ordered stand-in for [`ObservationChannel`] so channel order never depends on config order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Channel {
    Phase,
    LaneVehicleCount,
    LaneWaitingVehicleCount,
}

impl From<ObservationChannel> for Channel {
    fn from(channel: ObservationChannel) -> Self {
        match channel {
            ObservationChannel::Phase => Channel::Phase,
            ObservationChannel::LaneVehicleCount => Channel::LaneVehicleCount,
            ObservationChannel::LaneWaitingVehicleCount => Channel::LaneWaitingVehicleCount,
        }
    }
}

impl TelemetryAggregator {
    pub fn new(topology: &Topology, channels: &[ObservationChannel]) -> Self {
        let channels: BTreeSet<Channel> = channels.iter().copied().map(Channel::from).collect();
        let layout = (0..topology.len())
            .map(|position| {
                channels
                    .iter()
                    .map(|channel| match channel {
                        Channel::Phase => topology.intersections()[position].green_count(),
                        Channel::LaneVehicleCount | Channel::LaneWaitingVehicleCount => {
                            topology.incoming_lane_count(position)
                        }
                    })
                    .sum()
            })
            .collect();
        Self { channels, layout }
    }

    /// Length of the flat observation
    pub fn observation_len(&self) -> usize {
        self.layout.iter().sum()
    }

    /// Feature count of each intersection, in topology order
    pub fn layout(&self) -> &[usize] {
        &self.layout
    }

    pub fn build_observation<E: SimulationEngine>(
        &self,
        topology: &Topology,
        phases: &[usize],
        engine: &E,
    ) -> EnvResult<Observation> {
        let vehicles = if self.channels.contains(&Channel::LaneVehicleCount) {
            Some(engine.lane_vehicle_count().engine_call("lane_vehicle_count")?)
        } else {
            None
        };
        let waiting = if self.channels.contains(&Channel::LaneWaitingVehicleCount) {
            Some(
                engine
                    .lane_waiting_vehicle_count()
                    .engine_call("lane_waiting_vehicle_count")?,
            )
        } else {
            None
        };

        let mut entries = Vec::with_capacity(topology.len());
        for (position, intersection) in topology.intersections().iter().enumerate() {
            let mut features = Vec::with_capacity(self.layout[position]);
            for channel in &self.channels {
                match channel {
                    Channel::Phase => {
                        let current = *phases.get(position).ok_or_else(|| {
                            EnvError::ObservationShapeMismatch(format!(
                                "no current phase for intersection {}",
                                intersection.id
                            ))
                        })?;
                        let mut one_hot = vec![0.0; intersection.green_count()];
                        let slot = one_hot.get_mut(current).ok_or_else(|| {
                            EnvError::ObservationShapeMismatch(format!(
                                "phase {} outside the {} greens of intersection {}",
                                current,
                                intersection.green_count(),
                                intersection.id
                            ))
                        })?;
                        *slot = 1.0;
                        features.extend(one_hot);
                    }
                    Channel::LaneVehicleCount => {
                        if let Some(counts) = &vehicles {
                            self.push_incoming(topology, position, counts, &mut features)?;
                        }
                    }
                    Channel::LaneWaitingVehicleCount => {
                        if let Some(counts) = &waiting {
                            self.push_incoming(topology, position, counts, &mut features)?;
                        }
                    }
                }
            }

            if features.len() != self.layout[position] {
                return Err(EnvError::ObservationShapeMismatch(format!(
                    "intersection {} produced {} features, expected {}",
                    intersection.id,
                    features.len(),
                    self.layout[position]
                )));
            }
            entries.push((intersection.id.clone(), features));
        }

        Ok(Observation { entries })
    }

    fn push_incoming(
        &self,
        topology: &Topology,
        position: usize,
        counts: &LaneCounts,
        features: &mut Vec<f32>,
    ) -> EnvResult<()> {
        for road in &topology.intersections()[position].in_roads {
            for lane in topology.road_lanes(road) {
                let count = counts.get(lane.as_str()).ok_or_else(|| {
                    EnvError::ObservationShapeMismatch(format!(
                        "engine snapshot is missing lane {}",
                        lane
                    ))
                })?;
                features.push(*count as f32);
            }
        }
        Ok(())
    }

    /// `-(waiting on incoming lanes - waiting on outgoing lanes)` per intersection
    pub fn build_reward<E: SimulationEngine>(
        &self,
        topology: &Topology,
        engine: &E,
    ) -> EnvResult<IntersectionRewards> {
        let waiting = engine
            .lane_waiting_vehicle_count()
            .engine_call("lane_waiting_vehicle_count")?;

        let mut pressure = vec![0i64; topology.len()];
        for (lane, count) in &waiting {
            let Some(binding) = topology.lane_binding(lane) else {
                continue;
            };
            for (position, direction) in &binding.approaches {
                match direction {
                    Direction::Incoming => pressure[*position] += i64::from(*count),
                    Direction::Outgoing => pressure[*position] -= i64::from(*count),
                }
            }
        }

        let entries = topology
            .intersections()
            .iter()
            .zip(pressure)
            .map(|(intersection, pressure)| (intersection.id.clone(), -(pressure as f32)))
            .collect();
        Ok(IntersectionRewards { entries })
    }
}
