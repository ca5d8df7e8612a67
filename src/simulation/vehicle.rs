//! Vehicle movement logic for the reference engine

use anyhow::{Context, Result};
use ordered_float::OrderedFloat;
use std::collections::HashMap;

use super::intersection::SimIntersection;
use super::road_network::SimRoadNetwork;
use super::types::{LaneIndex, RoadIndex, VehicleId};

/// Result of a vehicle update indicating what should happen to the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleUpdate {
    Continue,    // Vehicle stays in the network
    LeftNetwork, // Vehicle reached the end of its route or the network boundary
}

/// A vehicle in the traffic simulation
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    /// Roads to drive, in order
    pub route: Vec<RoadIndex>,
    /// Position of the current road in `route`
    pub route_position: usize,
    pub lane: LaneIndex,
    pub distance_along_lane: OrderedFloat<f32>,
    /// Speed over the last tick in m/s
    pub speed: f32,
    pub max_speed: f32,
    /// Space kept to the vehicle ahead, measured start to start
    pub following_distance: f32,
    /// Last tick this vehicle moved in
    pub last_tick: u64,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        route: Vec<RoadIndex>,
        lane: LaneIndex,
        max_speed: f32,
        following_distance: f32,
    ) -> Self {
        Self {
            id,
            route,
            route_position: 0,
            lane,
            distance_along_lane: OrderedFloat(0.0),
            speed: 0.0,
            max_speed,
            following_distance,
            last_tick: 0,
        }
    }

    pub fn current_road(&self) -> Option<RoadIndex> {
        self.route.get(self.route_position).copied()
    }

    fn next_road(&self) -> Option<RoadIndex> {
        self.route.get(self.route_position + 1).copied()
    }

    /// Move the vehicle for one tick
    pub fn update(
        &mut self,
        tick: u64,
        delta_secs: f32,
        road_network: &mut SimRoadNetwork,
        intersections: &HashMap<String, SimIntersection>,
    ) -> Result<VehicleUpdate> {
        self.last_tick = tick;

        let (lane_length, lane_speed, lane_index, road) = {
            let lane = road_network.lane(self.lane);
            (lane.length, lane.max_speed, lane.index, lane.road)
        };
        let free_speed = self.max_speed.min(lane_speed);
        let mut distance_delta = free_speed * delta_secs;

        // Keep the following distance to the vehicle ahead
        if let Some((ahead_distance, _)) =
            road_network.find_vehicle_ahead(self.lane, self.distance_along_lane)
        {
            let room = ahead_distance.into_inner()
                - self.distance_along_lane.into_inner()
                - self.following_distance;
            distance_delta = distance_delta.min(room.max(0.0));
        }

        let distance_to_end = (lane_length - self.distance_along_lane.into_inner()).max(0.0);

        if distance_delta >= distance_to_end {
            let Some(next_road) = self.next_road() else {
                road_network.remove_vehicle(self.lane, self.distance_along_lane);
                return Ok(VehicleUpdate::LeftNetwork);
            };

            let end_intersection = &road_network.road(road).end_intersection;
            let intersection = intersections
                .get(end_intersection)
                .with_context(|| format!("Intersection {} not found", end_intersection))?;

            if intersection.is_virtual {
                road_network.remove_vehicle(self.lane, self.distance_along_lane);
                return Ok(VehicleUpdate::LeftNetwork);
            }

            let link = intersection.find_link(road, next_road).with_context(|| {
                format!(
                    "Intersection {} has no road link from {} to {}",
                    intersection.id,
                    road_network.road(road).id,
                    road_network.road(next_road).id
                )
            })?;

            if intersection.is_link_open(link) {
                let target_index = intersection.target_lane(link, lane_index);
                let target_lane = road_network
                    .road(next_road)
                    .lanes
                    .get(target_index)
                    .copied()
                    .with_context(|| {
                        format!(
                            "Road {} has no lane {}",
                            road_network.road(next_road).id,
                            target_index
                        )
                    })?;

                if road_network.can_enter(target_lane, self.following_distance) {
                    road_network.remove_vehicle(self.lane, self.distance_along_lane);
                    road_network.place_vehicle(target_lane, OrderedFloat(0.0), self.id)?;
                    self.lane = target_lane;
                    self.distance_along_lane = OrderedFloat(0.0);
                    self.route_position += 1;
                    self.speed = free_speed;
                    return Ok(VehicleUpdate::Continue);
                }
            }

            // Hold at the stop line
            distance_delta = distance_to_end;
        }

        let previous_distance = self.distance_along_lane;
        self.distance_along_lane += distance_delta;
        road_network.move_vehicle(
            self.lane,
            previous_distance,
            self.distance_along_lane,
            self.id,
        )?;
        self.speed = if delta_secs > 0.0 {
            distance_delta / delta_secs
        } else {
            0.0
        };

        Ok(VehicleUpdate::Continue)
    }
}
