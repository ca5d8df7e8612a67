//! Reference traffic engine
//!
//! A standalone car-following simulator that implements the engine contract
//! the signal controller drives. It lets the controller be run and tested
//! without the native microscopic simulator.

mod intersection;
mod road_network;
mod types;
mod vehicle;
mod world;

pub use intersection::{SimIntersection, SimPhase, SimRoadLink};
pub use road_network::{RoadEdge, SimRoadNetwork};
pub use types::{
    LaneIndex, RoadIndex, SimId, SimLane, SimRoad, VehicleId, WAITING_SPEED_THRESHOLD,
};
pub use vehicle::{SimVehicle, VehicleUpdate};
pub use world::{EngineSettings, SimWorld};
