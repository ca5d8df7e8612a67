//! Tick scheduling and episode clock

use log::trace;

use super::error::{EngineResultExt, EnvResult};
use crate::engine::SimulationEngine;

/// Advances the engine and keeps the cumulative episode duration
#[derive(Debug, Clone)]
pub struct TickScheduler {
    elapsed: u64,
    max_episode_duration: u64,
}

impl TickScheduler {
    pub fn new(max_episode_duration: u64) -> Self {
        Self {
            elapsed: 0,
            max_episode_duration,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0;
    }

    /// Advance the engine exactly `ticks` ticks
    pub fn run<E: SimulationEngine>(&mut self, engine: &mut E, ticks: u64) -> EnvResult<()> {
        trace!("Running {} ticks from t={}", ticks, self.elapsed);
        for _ in 0..ticks {
            engine.next_step().engine_call("next_step")?;
        }
        self.elapsed += ticks;
        Ok(())
    }

    /// Ticks consumed since the last reset
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn max_episode_duration(&self) -> u64 {
        self.max_episode_duration
    }

    /// The episode ends once the budget is strictly exceeded
    pub fn is_done(&self) -> bool {
        self.elapsed > self.max_episode_duration
    }
}
