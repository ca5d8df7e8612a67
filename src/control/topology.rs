//! Static description of the controlled road network
//!
//! Built once per environment from the road network file and the engine's
//! lane enumeration, then read-only.

use log::{debug, warn};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use std::collections::HashMap;

use super::config::Durations;
use super::error::{EnvError, EnvResult};
use super::types::{Direction, IntersectionId, LaneId, RoadId};
use crate::roadnet::{lane_id, LightPhaseSpec, RoadnetFile};

/// Role of a light phase, decided by how many road links it enables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseClass {
    /// More than four links: a usable driving phase
    Green,
    /// Exactly four links: clearance
    Yellow,
    /// No links: all traffic stopped
    Red,
}

impl PhaseClass {
    pub fn classify(active_links: usize) -> Option<Self> {
        match active_links {
            0 => Some(PhaseClass::Red),
            4 => Some(PhaseClass::Yellow),
            n if n > 4 => Some(PhaseClass::Green),
            _ => None,
        }
    }
}

/// Engine phase indices of an intersection, grouped by class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSet {
    pub green: Vec<usize>,
    /// `yellow[i]` clears traffic leaving `green[i]`
    pub yellow: Vec<usize>,
    pub red: Vec<usize>,
}

impl PhaseSet {
    pub fn classify(intersection: &str, phases: &[LightPhaseSpec]) -> EnvResult<Self> {
        let mut set = PhaseSet::default();
        for (index, phase) in phases.iter().enumerate() {
            let links = phase.available_road_links.len();
            match PhaseClass::classify(links) {
                Some(PhaseClass::Green) => set.green.push(index),
                Some(PhaseClass::Yellow) => set.yellow.push(index),
                Some(PhaseClass::Red) => set.red.push(index),
                None => {
                    return Err(EnvError::UnrecognizedPhase {
                        intersection: intersection.to_string(),
                        phase: index,
                        links,
                    })
                }
            }
        }
        Ok(set)
    }
}

/// A controlled intersection
#[derive(Debug, Clone)]
pub struct IntersectionTopology {
    pub id: IntersectionId,
    pub in_roads: Vec<RoadId>,
    pub out_roads: Vec<RoadId>,
    pub phases: PhaseSet,
}

impl IntersectionTopology {
    /// Number of selectable actions
    pub fn green_count(&self) -> usize {
        self.phases.green.len()
    }
}

/// Where a lane's counts contribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneBinding {
    pub road: RoadId,
    /// (intersection position, direction) for every controlled intersection the road touches
    pub approaches: Vec<(usize, Direction)>,
}

#[derive(Debug, Clone)]
pub struct Topology {
    intersections: Vec<IntersectionTopology>,
    index: HashMap<IntersectionId, usize>,
    road_lanes: HashMap<RoadId, Vec<LaneId>>,
    lane_bindings: HashMap<LaneId, LaneBinding>,
}

impl Topology {
    /// `engine_lanes` must follow the engine's lane enumeration order
    pub fn build<'a>(
        roadnet: &RoadnetFile,
        engine_lanes: impl IntoIterator<Item = &'a str>,
    ) -> EnvResult<Self> {
        let mut graph: DiGraph<IntersectionId, RoadId> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for item in &roadnet.intersections {
            let node = graph.add_node(IntersectionId::new(item.id.as_str()));
            if nodes.insert(item.id.as_str(), node).is_some() {
                return Err(EnvError::InvalidRoadnet(format!(
                    "intersection {} is declared twice",
                    item.id
                )));
            }
        }

        let mut road_edges: HashMap<&str, EdgeIndex> = HashMap::new();
        let mut declared_lanes: HashMap<String, RoadId> = HashMap::new();
        for road in &roadnet.roads {
            let endpoint = |id: &str| {
                nodes.get(id).copied().ok_or_else(|| {
                    EnvError::InvalidRoadnet(format!(
                        "road {} references unknown intersection {}",
                        road.id, id
                    ))
                })
            };
            let start = endpoint(&road.start_intersection)?;
            let end = endpoint(&road.end_intersection)?;
            let edge = graph.add_edge(start, end, RoadId::new(road.id.as_str()));
            if road_edges.insert(road.id.as_str(), edge).is_some() {
                return Err(EnvError::InvalidRoadnet(format!(
                    "road {} is declared twice",
                    road.id
                )));
            }
            for index in 0..road.lanes.len() {
                declared_lanes.insert(lane_id(&road.id, index), RoadId::new(road.id.as_str()));
            }
        }

        let mut intersections = Vec::new();
        for item in roadnet.intersections.iter().filter(|item| !item.is_virtual) {
            let node = nodes[item.id.as_str()];
            let mut in_roads = Vec::new();
            let mut out_roads = Vec::new();
            for road in &item.roads {
                let edge = road_edges.get(road.as_str()).ok_or_else(|| {
                    EnvError::InvalidRoadnet(format!(
                        "intersection {} lists unknown road {}",
                        item.id, road
                    ))
                })?;
                let (source, target) = graph.edge_endpoints(*edge).ok_or_else(|| {
                    EnvError::InvalidRoadnet(format!("road {} has no endpoints", road))
                })?;
                if target == node {
                    in_roads.push(graph[*edge].clone());
                } else if source == node {
                    out_roads.push(graph[*edge].clone());
                } else {
                    return Err(EnvError::InvalidRoadnet(format!(
                        "road {} does not touch intersection {}",
                        road, item.id
                    )));
                }
            }

            let phases = PhaseSet::classify(&item.id, item.light_phases())?;
            if phases.green.is_empty() {
                return Err(EnvError::InvalidRoadnet(format!(
                    "intersection {} has no green phase",
                    item.id
                )));
            }

            intersections.push(IntersectionTopology {
                id: graph[node].clone(),
                in_roads,
                out_roads,
                phases,
            });
        }

        let mut road_lanes: HashMap<RoadId, Vec<LaneId>> = roadnet
            .roads
            .iter()
            .map(|road| (RoadId::new(road.id.as_str()), Vec::new()))
            .collect();
        let mut lane_bindings: HashMap<LaneId, LaneBinding> = HashMap::new();
        for lane in engine_lanes {
            let road = declared_lanes.get(lane).ok_or_else(|| {
                EnvError::InvalidRoadnet(format!(
                    "engine reports lane {} that no road declares",
                    lane
                ))
            })?;
            if let Some(lanes) = road_lanes.get_mut(road) {
                lanes.push(LaneId::new(lane));
            }
            lane_bindings.insert(
                LaneId::new(lane),
                LaneBinding {
                    road: road.clone(),
                    approaches: Vec::new(),
                },
            );
        }

        for (position, intersection) in intersections.iter().enumerate() {
            let roads = intersection
                .in_roads
                .iter()
                .map(|road| (road, Direction::Incoming))
                .chain(
                    intersection
                        .out_roads
                        .iter()
                        .map(|road| (road, Direction::Outgoing)),
                );
            for (road, direction) in roads {
                let lanes = road_lanes.get(road).map(Vec::as_slice).unwrap_or(&[]);
                if lanes.is_empty() {
                    warn!(
                        "Road {} of intersection {} has no lanes reported by the engine",
                        road, intersection.id
                    );
                }
                for lane in lanes {
                    if let Some(binding) = lane_bindings.get_mut(lane) {
                        binding.approaches.push((position, direction));
                    }
                }
            }
        }

        let mut unbound: Vec<&str> = lane_bindings
            .iter()
            .filter(|(_, binding)| binding.approaches.is_empty())
            .map(|(lane, _)| lane.as_str())
            .collect();
        unbound.sort_unstable();
        for lane in unbound {
            warn!("Lane {} touches no controlled intersection", lane);
        }

        let index = intersections
            .iter()
            .enumerate()
            .map(|(position, intersection)| (intersection.id.clone(), position))
            .collect();

        debug!(
            "Topology built: {} controlled intersections, {} lanes",
            intersections.len(),
            lane_bindings.len()
        );

        Ok(Self {
            intersections,
            index,
            road_lanes,
            lane_bindings,
        })
    }

    /// Controlled intersections in fixed topology order
    pub fn intersections(&self) -> &[IntersectionTopology] {
        &self.intersections
    }

    pub fn len(&self) -> usize {
        self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intersections.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn intersection(&self, id: &str) -> Option<&IntersectionTopology> {
        self.position(id).map(|position| &self.intersections[position])
    }

    /// Lanes of a road in engine enumeration order
    pub fn road_lanes(&self, road: &RoadId) -> &[LaneId] {
        self.road_lanes.get(road).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lane_binding(&self, lane: &str) -> Option<&LaneBinding> {
        self.lane_bindings.get(lane)
    }

    /// Green phase count of every intersection, in topology order
    pub fn green_counts(&self) -> Vec<usize> {
        self.intersections
            .iter()
            .map(IntersectionTopology::green_count)
            .collect()
    }

    /// Lanes on all incoming roads of the intersection at `position`
    pub fn incoming_lane_count(&self, position: usize) -> usize {
        self.intersections[position]
            .in_roads
            .iter()
            .map(|road| self.road_lanes(road).len())
            .sum()
    }

    /// Check that every intersection has the clearance phases the durations require
    pub fn validate_clearance(&self, durations: &Durations) -> EnvResult<()> {
        for intersection in &self.intersections {
            let phases = &intersection.phases;
            if durations.yellow > 0 && phases.yellow.len() < phases.green.len() {
                return Err(EnvError::InvalidRoadnet(format!(
                    "intersection {} has {} green but only {} yellow phases",
                    intersection.id,
                    phases.green.len(),
                    phases.yellow.len()
                )));
            }
            if durations.red > 0 && phases.red.is_empty() {
                return Err(EnvError::InvalidRoadnet(format!(
                    "intersection {} has no red phase for the red stage",
                    intersection.id
                )));
            }
        }
        Ok(())
    }
}
