//! Core types for the reference engine

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub SimId);

/// Position of a road in the network's road table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadIndex(pub usize);

/// Position of a lane in the network's lane table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneIndex(pub usize);

/// A directed road between two intersections
#[derive(Debug, Clone)]
pub struct SimRoad {
    pub id: String,
    pub start_intersection: String,
    pub end_intersection: String,
    pub length: f32,
    /// Lanes ordered by their index on the road
    pub lanes: Vec<LaneIndex>,
}

/// One lane of a road
#[derive(Debug, Clone)]
pub struct SimLane {
    pub id: String,
    pub road: RoadIndex,
    /// Index of the lane within its road
    pub index: usize,
    pub length: f32,
    pub max_speed: f32,
}

/// Vehicles slower than this (m/s) count as waiting
pub const WAITING_SPEED_THRESHOLD: f32 = 0.1;
