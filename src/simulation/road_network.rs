//! Road network graph for route completion and lane occupancy tracking

use anyhow::{bail, Context, Result};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;

use super::types::{LaneIndex, RoadIndex, SimLane, SimRoad, VehicleId};
use crate::roadnet::{lane_id, RoadnetFile};

/// Edge data for the road network graph
#[derive(Debug, Clone, Copy)]
pub struct RoadEdge {
    pub road: RoadIndex,
    pub weight: u32, // Road length scaled for integer weights
}

impl RoadEdge {
    pub fn from_road(index: RoadIndex, road: &SimRoad) -> Self {
        // Convert road length to integer weight (scaled by 100 to preserve precision)
        let weight = (road.length * 100.0) as u32;
        Self {
            road: index,
            weight: weight.max(1), // Ensure minimum weight of 1
        }
    }
}

/// Roads, lanes and the vehicles on them
#[derive(Default)]
pub struct SimRoadNetwork {
    /// Directed graph of intersections (nodes) and roads (edges)
    graph: DiGraph<String, RoadEdge>,

    /// Maps intersection IDs to their node indices in the graph
    intersection_to_node: HashMap<String, NodeIndex>,

    roads: Vec<SimRoad>,
    road_lookup: HashMap<String, RoadIndex>,

    lanes: Vec<SimLane>,

    /// Per lane, vehicles keyed by distance from the lane start
    vehicles_on_lanes: Vec<BTreeMap<OrderedFloat<f32>, VehicleId>>,

    /// Cached shortest paths between intersections
    path_cache: HashMap<(NodeIndex, NodeIndex), Vec<RoadIndex>>,
}

impl SimRoadNetwork {
    pub fn from_roadnet(roadnet: &RoadnetFile) -> Result<Self> {
        let mut network = Self::default();

        for intersection in &roadnet.intersections {
            let node = network.graph.add_node(intersection.id.clone());
            network
                .intersection_to_node
                .insert(intersection.id.clone(), node);
        }

        for spec in &roadnet.roads {
            if network.road_lookup.contains_key(&spec.id) {
                bail!("Road {} is declared twice", spec.id);
            }
            let start_node = *network
                .intersection_to_node
                .get(&spec.start_intersection)
                .with_context(|| {
                    format!(
                        "Road {} starts at unknown intersection {}",
                        spec.id, spec.start_intersection
                    )
                })?;
            let end_node = *network
                .intersection_to_node
                .get(&spec.end_intersection)
                .with_context(|| {
                    format!(
                        "Road {} ends at unknown intersection {}",
                        spec.id, spec.end_intersection
                    )
                })?;

            let road_index = RoadIndex(network.roads.len());
            let length = spec.length();
            let mut lanes = Vec::with_capacity(spec.lanes.len());
            for (index, lane) in spec.lanes.iter().enumerate() {
                let lane_index = LaneIndex(network.lanes.len());
                network.lanes.push(SimLane {
                    id: lane_id(&spec.id, index),
                    road: road_index,
                    index,
                    length,
                    max_speed: lane.max_speed,
                });
                network.vehicles_on_lanes.push(BTreeMap::new());
                lanes.push(lane_index);
            }

            let road = SimRoad {
                id: spec.id.clone(),
                start_intersection: spec.start_intersection.clone(),
                end_intersection: spec.end_intersection.clone(),
                length,
                lanes,
            };
            network
                .graph
                .add_edge(start_node, end_node, RoadEdge::from_road(road_index, &road));
            network.road_lookup.insert(road.id.clone(), road_index);
            network.roads.push(road);
        }

        Ok(network)
    }

    pub fn road(&self, index: RoadIndex) -> &SimRoad {
        &self.roads[index.0]
    }

    pub fn lane(&self, index: LaneIndex) -> &SimLane {
        &self.lanes[index.0]
    }

    pub fn road_index(&self, id: &str) -> Option<RoadIndex> {
        self.road_lookup.get(id).copied()
    }

    pub fn lanes(&self) -> &[SimLane] {
        &self.lanes
    }

    /// Get number of roads
    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// Get number of lanes
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Finds a road path between two intersections using A* (Dijkstra with null heuristic)
    pub fn find_path(&mut self, start: &str, end: &str) -> Option<Vec<RoadIndex>> {
        let start_node = *self.intersection_to_node.get(start)?;
        let end_node = *self.intersection_to_node.get(end)?;
        if start_node == end_node {
            return Some(vec![]);
        }

        if let Some(path) = self.path_cache.get(&(start_node, end_node)) {
            return Some(path.clone());
        }

        let (_, node_path) = astar(
            &self.graph,
            start_node,
            |node| node == end_node,
            |edge| edge.weight().weight,
            |_| 0, // Null heuristic = Dijkstra
        )?;

        let mut roads = Vec::with_capacity(node_path.len().saturating_sub(1));
        for pair in node_path.windows(2) {
            let edge = self.graph.find_edge(pair[0], pair[1])?;
            roads.push(self.graph[edge].road);
        }

        self.path_cache.insert((start_node, end_node), roads.clone());
        Some(roads)
    }

    /// Resolve a flow route, filling gaps between non-adjacent roads with shortest paths
    pub fn complete_route(&mut self, route: &[String]) -> Result<Vec<RoadIndex>> {
        let mut resolved: Vec<RoadIndex> = Vec::with_capacity(route.len());
        for id in route {
            let next = self
                .road_index(id)
                .with_context(|| format!("Route references unknown road {}", id))?;
            if let Some(&previous) = resolved.last() {
                let from = self.road(previous).end_intersection.clone();
                let to = self.road(next).start_intersection.clone();
                if from != to {
                    let bridge = self.find_path(&from, &to).with_context(|| {
                        format!("No path from {} to {} to complete the route", from, to)
                    })?;
                    resolved.extend(bridge);
                }
            }
            resolved.push(next);
        }
        Ok(resolved)
    }

    /// Put a vehicle on a lane at the given distance
    pub fn place_vehicle(
        &mut self,
        lane: LaneIndex,
        distance: OrderedFloat<f32>,
        vehicle: VehicleId,
    ) -> Result<()> {
        let lane_map = self
            .vehicles_on_lanes
            .get_mut(lane.0)
            .context("Lane has no vehicle list")?;
        if let Some(existing) = lane_map.get(&distance) {
            if *existing != vehicle {
                bail!(
                    "Vehicles {:?} and {:?} overlap on lane {}",
                    existing,
                    vehicle,
                    self.lanes[lane.0].id
                );
            }
        }
        lane_map.insert(distance, vehicle);
        Ok(())
    }

    pub fn remove_vehicle(&mut self, lane: LaneIndex, distance: OrderedFloat<f32>) {
        if let Some(lane_map) = self.vehicles_on_lanes.get_mut(lane.0) {
            lane_map.remove(&distance);
        }
    }

    /// Update a vehicle's distance on its lane
    pub fn move_vehicle(
        &mut self,
        lane: LaneIndex,
        from: OrderedFloat<f32>,
        to: OrderedFloat<f32>,
        vehicle: VehicleId,
    ) -> Result<()> {
        self.remove_vehicle(lane, from);
        self.place_vehicle(lane, to, vehicle)
    }

    /// Find the vehicle directly ahead on the same lane
    pub fn find_vehicle_ahead(
        &self,
        lane: LaneIndex,
        current_distance: OrderedFloat<f32>,
    ) -> Option<(OrderedFloat<f32>, VehicleId)> {
        self.vehicles_on_lanes
            .get(lane.0)?
            .range((Bound::Excluded(current_distance), Bound::Unbounded))
            .next()
            .map(|(distance, vehicle)| (*distance, *vehicle))
    }

    /// Whether the lane start has at least `gap` metres of free space
    pub fn can_enter(&self, lane: LaneIndex, gap: f32) -> bool {
        match self
            .vehicles_on_lanes
            .get(lane.0)
            .and_then(|lane_map| lane_map.first_key_value())
        {
            Some((tail, _)) => tail.into_inner() >= gap,
            None => true,
        }
    }

    /// Vehicles on a lane, front (furthest along) first
    pub fn vehicles_front_to_back(&self, lane: LaneIndex) -> Vec<VehicleId> {
        self.vehicles_on_lanes
            .get(lane.0)
            .map(|lane_map| lane_map.values().rev().copied().collect())
            .unwrap_or_default()
    }

    pub fn occupancy(&self, lane: LaneIndex) -> usize {
        self.vehicles_on_lanes
            .get(lane.0)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub fn clear_vehicles(&mut self) {
        for lane_map in &mut self.vehicles_on_lanes {
            lane_map.clear();
        }
    }
}
