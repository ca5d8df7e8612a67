//! The contract a microscopic traffic simulator has to offer the controller

use anyhow::Result;
use std::collections::BTreeMap;

/// Per-lane counts keyed by lane id. Key order is the engine's lane enumeration.
pub type LaneCounts = BTreeMap<String, u32>;

/// A tick-driven traffic simulator
///
/// Every call is synchronous. Phase changes take effect on the next tick.
pub trait SimulationEngine {
    /// Put vehicles and time back to the start of the episode
    fn reset(&mut self) -> Result<()>;

    /// Advance exactly one tick
    fn next_step(&mut self) -> Result<()>;

    /// Switch an intersection to the light phase at `phase` in its program
    fn set_traffic_light_phase(&mut self, intersection: &str, phase: usize) -> Result<()>;

    /// Vehicles currently on each lane, all lanes included
    fn lane_vehicle_count(&self) -> Result<LaneCounts>;

    /// Vehicles on each lane below the waiting speed threshold
    fn lane_waiting_vehicle_count(&self) -> Result<LaneCounts>;

    fn set_random_seed(&mut self, seed: u64) -> Result<()>;

    /// Free per-episode resources. The engine must still accept `reset` afterwards.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
