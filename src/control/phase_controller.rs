//! Staged phase transitions
//!
//! Intersections whose target differs from their current green go through
//! the red and yellow clearance stages before the new green; the others keep
//! their green for the whole step. All intersections share one tick clock.

use log::{debug, trace};

use super::config::Durations;
use super::error::{EngineResultExt, EnvError, EnvResult};
use super::scheduler::TickScheduler;
use super::topology::Topology;
use crate::engine::SimulationEngine;

/// A green-to-green change at one intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Position of the intersection in topology order
    pub intersection: usize,
    /// Green index being vacated
    pub from: usize,
    pub to: usize,
}

/// How a step split the intersections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Intersections whose green was re-asserted
    pub held: Vec<usize>,
    pub changed: Vec<Transition>,
}

impl TransitionPlan {
    /// True when no intersection changes phase
    pub fn is_idle(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Owns the current green index of every intersection
#[derive(Debug, Clone)]
pub struct PhaseController {
    current: Vec<usize>,
    durations: Durations,
}

impl PhaseController {
    pub fn new(intersections: usize, durations: Durations) -> Self {
        Self {
            current: vec![0; intersections],
            durations,
        }
    }

    /// Current green index per intersection, in topology order
    pub fn current(&self) -> &[usize] {
        &self.current
    }

    pub fn durations(&self) -> Durations {
        self.durations
    }

    /// Start every intersection on its first green.
    /// Phase commands are skipped when the engine runs its own programs.
    pub fn reset<E: SimulationEngine>(
        &mut self,
        topology: &Topology,
        engine: &mut E,
        command_phases: bool,
    ) -> EnvResult<()> {
        self.current = vec![0; topology.len()];
        if command_phases {
            for intersection in topology.intersections() {
                engine
                    .set_traffic_light_phase(intersection.id.as_str(), intersection.phases.green[0])
                    .engine_call("set_traffic_light_phase")?;
            }
        }
        Ok(())
    }

    /// Split intersections into held and changed ones without touching the engine
    pub fn plan(&self, targets: &[usize]) -> TransitionPlan {
        let mut plan = TransitionPlan::default();
        for (intersection, (&target, &current)) in targets.iter().zip(&self.current).enumerate() {
            if target == current {
                plan.held.push(intersection);
            } else {
                plan.changed.push(Transition {
                    intersection,
                    from: current,
                    to: target,
                });
            }
        }
        plan
    }

    /// Drive every intersection to its target green, consuming exactly
    /// `red + yellow + green` ticks
    pub fn apply<E: SimulationEngine>(
        &mut self,
        targets: &[usize],
        topology: &Topology,
        scheduler: &mut TickScheduler,
        engine: &mut E,
    ) -> EnvResult<TransitionPlan> {
        if targets.len() != topology.len() {
            return Err(EnvError::InvalidAction(format!(
                "expected {} targets, got {}",
                topology.len(),
                targets.len()
            )));
        }
        for (intersection, &target) in topology.intersections().iter().zip(targets) {
            if target >= intersection.green_count() {
                return Err(EnvError::InvalidAction(format!(
                    "phase {} out of range for intersection {} with {} green phases",
                    target,
                    intersection.id,
                    intersection.green_count()
                )));
            }
        }

        let plan = self.plan(targets);
        let intersections = topology.intersections();

        for &position in &plan.held {
            let intersection = &intersections[position];
            let target = targets[position];
            engine
                .set_traffic_light_phase(intersection.id.as_str(), intersection.phases.green[target])
                .engine_call("set_traffic_light_phase")?;
            self.current[position] = target;
        }

        if plan.is_idle() {
            scheduler.run(engine, self.durations.step_ticks())?;
            return Ok(plan);
        }

        debug!(
            "{} intersections changing phase, {} held",
            plan.changed.len(),
            plan.held.len()
        );

        if self.durations.red > 0 {
            for transition in &plan.changed {
                let intersection = &intersections[transition.intersection];
                let red = *intersection.phases.red.first().ok_or_else(|| {
                    EnvError::InvalidRoadnet(format!(
                        "intersection {} has no red phase",
                        intersection.id
                    ))
                })?;
                engine
                    .set_traffic_light_phase(intersection.id.as_str(), red)
                    .engine_call("set_traffic_light_phase")?;
            }
            trace!("Red stage");
            scheduler.run(engine, self.durations.red)?;
        }

        if self.durations.yellow > 0 {
            for transition in &plan.changed {
                let intersection = &intersections[transition.intersection];
                let yellow = *intersection.phases.yellow.get(transition.from).ok_or_else(|| {
                    EnvError::InvalidRoadnet(format!(
                        "intersection {} has no yellow phase for green {}",
                        intersection.id, transition.from
                    ))
                })?;
                engine
                    .set_traffic_light_phase(intersection.id.as_str(), yellow)
                    .engine_call("set_traffic_light_phase")?;
            }
            trace!("Yellow stage");
            scheduler.run(engine, self.durations.yellow)?;
        }

        for transition in &plan.changed {
            let intersection = &intersections[transition.intersection];
            engine
                .set_traffic_light_phase(
                    intersection.id.as_str(),
                    intersection.phases.green[transition.to],
                )
                .engine_call("set_traffic_light_phase")?;
            self.current[transition.intersection] = transition.to;
        }
        trace!("Green stage");
        scheduler.run(engine, self.durations.green)?;

        Ok(plan)
    }
}
